//! # Fleet Reconcile 模块
//!
//! - [`PingMerger`]：把一次心跳合并进设备记录，并判断是否需要 harvest 配置
//! - [`ReconcileService`]：按序列号读取或新建记录 → 合并 → 写回
//! - [`DeviceTagService`]：按 id / 序列号 / 查询批量增删改用户标签
//! - [`Clock`]：注入的时间来源

pub mod clock;
pub mod error;
pub mod merge;
pub mod service;
pub mod tags;

pub use clock::*;
pub use error::*;
pub use merge::*;
pub use service::*;
pub use tags::*;
