//! 设备内存存储实现
//!
//! 用于测试和本地演示。
//!
//! 功能：
//! - 按 (租户, id) 存放整条记录
//! - 直接执行过滤 AST，按排序键 + id 排序
//! - 可选的单次返回上限，模拟文档库的结果集大小限制

use crate::error::StorageError;
use crate::filter::{DeviceFilter, DeviceScan, compare_records};
use crate::models::{DeviceRecord, IndexField};
use crate::traits::DeviceStore;
use crate::validation::{ensure_record_tenant, ensure_tenant};
use domain::TenantContext;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

type DeviceKey = (String, String);

/// 设备内存存储
///
/// 使用 RwLock + BTreeMap 提供线程安全的内存存储。
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: RwLock<BTreeMap<DeviceKey, DeviceRecord>>,
    indexes: RwLock<BTreeSet<IndexField>>,
    max_result_size: Option<usize>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单次 `query` 最多返回 `max` 条，`limit` 更大时被截断。
    pub fn with_max_result_size(max: usize) -> Self {
        Self {
            max_result_size: Some(max.max(1)),
            ..Self::default()
        }
    }

    /// 预置记录（测试用），绕过租户校验。
    pub fn with_records(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.devices.write() {
            for record in records {
                map.insert((record.tenant_id.clone(), record.id.clone()), record);
            }
        }
        store
    }

    /// 已声明的索引字段。
    pub fn indexed_fields(&self) -> Vec<IndexField> {
        self.indexes
            .read()
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// 所有租户的记录总数。
    pub fn len(&self) -> usize {
        self.devices.read().map(|map| map.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn effective_limit(&self, limit: usize) -> Option<usize> {
        match (limit, self.max_result_size) {
            (0, None) => None,
            (0, Some(max)) => Some(max),
            (limit, None) => Some(limit),
            (limit, Some(max)) => Some(limit.min(max)),
        }
    }

    fn matching(
        &self,
        ctx: &TenantContext,
        filter: &DeviceFilter,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tenant_slice(&map, &ctx.tenant_id)
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

/// 同一租户的键在 BTreeMap 中连续排列。
fn tenant_slice<'a>(
    map: &'a BTreeMap<DeviceKey, DeviceRecord>,
    tenant_id: &'a str,
) -> impl Iterator<Item = &'a DeviceRecord> + 'a {
    map.range((tenant_id.to_string(), String::new())..)
        .take_while(move |((tenant, _), _)| tenant == tenant_id)
        .map(|(_, record)| record)
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn load_by_id(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let item = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(&(ctx.tenant_id.clone(), id.to_string()))
            .cloned();
        Ok(item)
    }

    async fn load_by_serial(
        &self,
        ctx: &TenantContext,
        serial_number: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let item = tenant_slice(&map, &ctx.tenant_id)
            .find(|record| record.serial_number.as_deref() == Some(serial_number))
            .cloned();
        Ok(item)
    }

    async fn load_many(
        &self,
        ctx: &TenantContext,
        ids: &[String],
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let items = ids
            .iter()
            .filter_map(|id| map.get(&(ctx.tenant_id.clone(), id.clone())).cloned())
            .collect();
        Ok(items)
    }

    async fn count(&self, ctx: &TenantContext, filter: &DeviceFilter) -> Result<u64, StorageError> {
        ensure_tenant(ctx)?;
        Ok(self.matching(ctx, filter)?.len() as u64)
    }

    async fn query(
        &self,
        ctx: &TenantContext,
        scan: &DeviceScan,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        ensure_tenant(ctx)?;
        let mut items = self.matching(ctx, &scan.filter)?;
        items.sort_by(|a, b| compare_records(a, b, scan.order.as_ref()));
        let items = items.into_iter().skip(scan.skip);
        let items = match self.effective_limit(scan.limit) {
            Some(limit) => items.take(limit).collect(),
            None => items.collect(),
        };
        Ok(items)
    }

    async fn upsert(&self, ctx: &TenantContext, record: &DeviceRecord) -> Result<(), StorageError> {
        ensure_record_tenant(ctx, record)?;
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert((record.tenant_id.clone(), record.id.clone()), record.clone());
        Ok(())
    }

    async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<bool, StorageError> {
        ensure_tenant(ctx)?;
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(map.remove(&(ctx.tenant_id.clone(), id.to_string())).is_some())
    }

    async fn ensure_indexes(&self, fields: &[IndexField]) -> Result<(), StorageError> {
        let mut set = self
            .indexes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        set.extend(fields.iter().copied());
        Ok(())
    }
}
