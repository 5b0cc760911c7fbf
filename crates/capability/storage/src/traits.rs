//! 存储接口 Trait 定义
//!
//! DeviceStore：设备记录的持久化边界。
//!
//! 设计原则：
//! - 所有接口显式接收 TenantContext，租户选择逻辑分区
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发
//! - 写入为按 id 整体替换（upsert），并发写同一设备时后写者胜

use crate::error::StorageError;
use crate::filter::{DeviceFilter, DeviceScan};
use crate::models::{DeviceRecord, IndexField};
use async_trait::async_trait;
use domain::TenantContext;

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 按 id 读取
    async fn load_by_id(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 按序列号读取（序列号不强制唯一，返回任意一条）
    async fn load_by_serial(
        &self,
        ctx: &TenantContext,
        serial_number: &str,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 批量按 id 读取，缺失的 id 被忽略
    async fn load_many(
        &self,
        ctx: &TenantContext,
        ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 统计匹配过滤器的记录数
    async fn count(&self, ctx: &TenantContext, filter: &DeviceFilter)
    -> Result<u64, StorageError>;

    /// 执行一次有序、分页的查询
    ///
    /// 结果按排序键再按 id 排列；`limit` 为 0 表示不限，
    /// 但实现可以施加单次返回的上限。
    async fn query(
        &self,
        ctx: &TenantContext,
        scan: &DeviceScan,
    ) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 按 id 整体替换，不存在则插入
    async fn upsert(&self, ctx: &TenantContext, record: &DeviceRecord) -> Result<(), StorageError>;

    /// 按 id 删除
    async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<bool, StorageError>;

    /// 声明索引（幂等）
    async fn ensure_indexes(&self, fields: &[IndexField]) -> Result<(), StorageError>;
}
