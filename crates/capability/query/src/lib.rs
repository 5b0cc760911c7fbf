//! # Fleet Query 模块
//!
//! 设备查询：
//!
//! - [`DeviceQuery`]：调用方构造的声明式过滤描述（不持久化）
//! - [`PredicateCompiler`]：把描述编译为存储层的过滤 AST 和可选排序
//! - [`DeviceScanner`]：单页查询、分页循环的全量扫描、序列号批量查 id
//! - [`DriftReporter`]：上报值与期望值不一致的设备报告

pub mod compiler;
pub mod drift;
pub mod error;
pub mod model;
pub mod scanner;

pub use compiler::*;
pub use drift::*;
pub use error::*;
pub use model::*;
pub use scanner::*;
