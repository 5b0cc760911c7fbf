//! 设备工作单元
//!
//! 把读出的记录与其来源（存储句柄 + 租户上下文）绑定在一起，
//! 保存或删除时写回到读出的地方。

use crate::error::StorageError;
use crate::models::DeviceRecord;
use crate::traits::DeviceStore;
use domain::TenantContext;
use std::sync::Arc;

/// 单条记录的工作单元。
pub struct DeviceSession {
    store: Arc<dyn DeviceStore>,
    ctx: TenantContext,
    record: DeviceRecord,
}

impl DeviceSession {
    /// 包装一条新建或已读出的记录。
    pub fn new(store: Arc<dyn DeviceStore>, ctx: TenantContext, record: DeviceRecord) -> Self {
        Self { store, ctx, record }
    }

    /// 按 id 读取。
    pub async fn load(
        store: Arc<dyn DeviceStore>,
        ctx: &TenantContext,
        id: &str,
    ) -> Result<Option<Self>, StorageError> {
        let record = store.load_by_id(ctx, id).await?;
        Ok(record.map(|record| Self::new(store, ctx.clone(), record)))
    }

    /// 按序列号读取。
    pub async fn load_by_serial(
        store: Arc<dyn DeviceStore>,
        ctx: &TenantContext,
        serial_number: &str,
    ) -> Result<Option<Self>, StorageError> {
        let record = store.load_by_serial(ctx, serial_number).await?;
        Ok(record.map(|record| Self::new(store, ctx.clone(), record)))
    }

    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut DeviceRecord {
        &mut self.record
    }

    pub fn replace_record(&mut self, record: DeviceRecord) {
        self.record = record;
    }

    pub fn into_record(self) -> DeviceRecord {
        self.record
    }

    /// 写回来源存储。
    pub async fn save(&self) -> Result<(), StorageError> {
        self.store.upsert(&self.ctx, &self.record).await
    }

    /// 从来源存储删除。
    pub async fn delete(self) -> Result<bool, StorageError> {
        self.store.delete(&self.ctx, &self.record.id).await
    }
}

/// 多条记录的工作单元。
pub struct DeviceBatch {
    store: Arc<dyn DeviceStore>,
    ctx: TenantContext,
    records: Vec<DeviceRecord>,
}

impl DeviceBatch {
    pub fn from_records(
        store: Arc<dyn DeviceStore>,
        ctx: TenantContext,
        records: Vec<DeviceRecord>,
    ) -> Self {
        Self {
            store,
            ctx,
            records,
        }
    }

    /// 按 id 批量读取。
    pub async fn load_many(
        store: Arc<dyn DeviceStore>,
        ctx: &TenantContext,
        ids: &[String],
    ) -> Result<Self, StorageError> {
        let records = store.load_many(ctx, ids).await?;
        Ok(Self::from_records(store, ctx.clone(), records))
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [DeviceRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 逐条拆成单记录工作单元。
    pub fn into_sessions(self) -> Vec<DeviceSession> {
        let DeviceBatch {
            store,
            ctx,
            records,
        } = self;
        records
            .into_iter()
            .map(|record| DeviceSession::new(store.clone(), ctx.clone(), record))
            .collect()
    }

    /// 全部写回来源存储。
    pub async fn save_all(&self) -> Result<usize, StorageError> {
        for record in &self.records {
            self.store.upsert(&self.ctx, record).await?;
        }
        Ok(self.records.len())
    }
}
