//! # PostgreSQL 存储实现模块
//!
//! 生产环境使用的设备存储。
//!
//! ## 数据库模式
//!
//! - `device_documents`：(tenant_id, device_id) 主键，serial_number 冗余列，doc 为整条记录的 JSONB
//! - `idx_device_documents_serial`：(tenant_id, serial_number) 复合索引
//! - `ensure_indexes` 为每个声明的字段建表达式索引，数组字段（标签、能力）使用 GIN
//!
//! ## 安全考虑
//!
//! - 所有值通过参数绑定（`$1`, `$2` 等）
//! - SQL 中拼接的字段名只来自静态映射
//! - 所有查询显式包含 `tenant_id` 条件

pub mod device;

pub use device::*;
