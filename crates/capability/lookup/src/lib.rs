//! # Fleet Lookup 模块
//!
//! 心跳合并和查询编译需要的只读查找：
//!
//! - [`ConfigLookup`]：配置文件哈希 → 元数据，标题 → 哈希
//! - [`FirmwareLookup`]：固件版本 → 固件记录
//!
//! 实现：
//!
//! - `in_memory`：进程内目录，harvest 结果和测试通过 `register` 写入
//! - `redis_catalog`：Redis 中的 JSON 载荷 + 标题索引集合
//! - `cached`：读穿透缓存，只缓存命中结果；未命中每次都重新询问，
//!   这样 harvest 完成后的下一次心跳就能看到新配置

pub mod cached;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod redis_catalog;
pub mod traits;

pub use cached::*;
pub use error::*;
pub use in_memory::*;
pub use models::*;
pub use redis_catalog::{RedisConfigCatalog, RedisFirmwareCatalog};
pub use traits::*;
