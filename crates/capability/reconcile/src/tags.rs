//! 设备标签服务
//!
//! 标签先经 `normalize_tag` 规范化；只有标签集真正变化的记录才会写回。
//! 每个标签的净增减量交给外部 [`TagCounter`] 汇总。

use crate::error::ReconcileError;
use async_trait::async_trait;
use domain::{TenantContext, normalize_tag};
use fleet_query::{DeviceQuery, DeviceScanner};
use fleet_storage::{DeviceBatch, DeviceRecord, DeviceStore};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use tracing::info;

/// 标签计数汇总（外部协作方）
#[async_trait]
pub trait TagCounter: Send + Sync {
    async fn adjust(&self, ctx: &TenantContext, tag: &str, delta: i64) -> Result<(), ReconcileError>;
}

/// 不做任何汇总
#[derive(Debug, Default)]
pub struct NoopTagCounter;

#[async_trait]
impl TagCounter for NoopTagCounter {
    async fn adjust(&self, _ctx: &TenantContext, _tag: &str, _delta: i64) -> Result<(), ReconcileError> {
        Ok(())
    }
}

/// 进程内计数：(租户, 标签) → 设备数
#[derive(Debug, Default)]
pub struct InMemoryTagCounter {
    counts: RwLock<HashMap<(String, String), i64>>,
}

impl InMemoryTagCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, tenant_id: &str, tag: &str) -> i64 {
        self.counts
            .read()
            .ok()
            .and_then(|map| map.get(&(tenant_id.to_string(), tag.to_string())).copied())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TagCounter for InMemoryTagCounter {
    async fn adjust(&self, ctx: &TenantContext, tag: &str, delta: i64) -> Result<(), ReconcileError> {
        let mut map = self
            .counts
            .write()
            .map_err(|_| ReconcileError::Contract("tag counter lock failed".to_string()))?;
        *map.entry((ctx.tenant_id.clone(), tag.to_string()))
            .or_default() += delta;
        Ok(())
    }
}

/// 标签操作的目标设备
#[derive(Debug, Clone)]
pub enum DeviceSelector {
    Id(String),
    Serial(String),
    Ids(Vec<String>),
    /// 全部匹配查询的设备（全量扫描）
    Query(DeviceQuery),
}

/// 一次标签操作的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub devices_changed: usize,
    /// 每个标签的净增减量
    pub counts: BTreeMap<String, i64>,
}

impl TagUpdate {
    fn bump(&mut self, tag: &str, delta: i64) {
        *self.counts.entry(tag.to_string()).or_default() += delta;
    }
}

/// 设备标签服务
pub struct DeviceTagService {
    store: Arc<dyn DeviceStore>,
    scanner: Arc<DeviceScanner>,
    counter: Arc<dyn TagCounter>,
}

fn normalized(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = normalize_tag(tag);
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn add_to(record: &mut DeviceRecord, tags: &[String], update: &mut TagUpdate) -> bool {
    let mut changed = false;
    for tag in tags {
        if !record.has_tag(tag) {
            record.tags.push(tag.clone());
            update.bump(tag, 1);
            changed = true;
        }
    }
    changed
}

fn remove_from(record: &mut DeviceRecord, tags: &[String], update: &mut TagUpdate) -> bool {
    let mut changed = false;
    for tag in tags {
        if record.has_tag(tag) {
            record.tags.retain(|item| item != tag);
            update.bump(tag, -1);
            changed = true;
        }
    }
    changed
}

impl DeviceTagService {
    pub fn new(
        store: Arc<dyn DeviceStore>,
        scanner: Arc<DeviceScanner>,
        counter: Arc<dyn TagCounter>,
    ) -> Self {
        Self {
            store,
            scanner,
            counter,
        }
    }

    /// 给选中设备加标签。
    pub async fn add_tags(
        &self,
        ctx: &TenantContext,
        selector: &DeviceSelector,
        tags: &[String],
    ) -> Result<TagUpdate, ReconcileError> {
        let tags = normalized(tags);
        self.apply(ctx, selector, "add_tags", |record, update| {
            add_to(record, &tags, update)
        })
        .await
    }

    /// 从选中设备移除标签。
    pub async fn remove_tags(
        &self,
        ctx: &TenantContext,
        selector: &DeviceSelector,
        tags: &[String],
    ) -> Result<TagUpdate, ReconcileError> {
        let tags = normalized(tags);
        self.apply(ctx, selector, "remove_tags", |record, update| {
            remove_from(record, &tags, update)
        })
        .await
    }

    /// 把选中设备上的 `old` 标签换成 `new`；不带 `old` 的设备不受影响。
    pub async fn replace_tag(
        &self,
        ctx: &TenantContext,
        selector: &DeviceSelector,
        old: &str,
        new: &str,
    ) -> Result<TagUpdate, ReconcileError> {
        let old = normalize_tag(old);
        let new = normalize_tag(new);
        if old == new || new.is_empty() {
            return Ok(TagUpdate::default());
        }
        let old = vec![old];
        let new = vec![new];
        self.apply(ctx, selector, "replace_tag", |record, update| {
            if !record.has_tag(&old[0]) {
                return false;
            }
            remove_from(record, &old, update);
            add_to(record, &new, update);
            true
        })
        .await
    }

    async fn select(
        &self,
        ctx: &TenantContext,
        selector: &DeviceSelector,
    ) -> Result<DeviceBatch, ReconcileError> {
        let batch = match selector {
            DeviceSelector::Id(id) => {
                DeviceBatch::load_many(self.store.clone(), ctx, std::slice::from_ref(id)).await?
            }
            DeviceSelector::Serial(serial) => {
                let records = self
                    .store
                    .load_by_serial(ctx, serial)
                    .await?
                    .into_iter()
                    .collect();
                DeviceBatch::from_records(self.store.clone(), ctx.clone(), records)
            }
            DeviceSelector::Ids(ids) => DeviceBatch::load_many(self.store.clone(), ctx, ids).await?,
            DeviceSelector::Query(query) => {
                let scan = self.scanner.scan_all(ctx, query).await?;
                DeviceBatch::from_records(self.store.clone(), ctx.clone(), scan.records)
            }
        };
        Ok(batch)
    }

    async fn apply<F>(
        &self,
        ctx: &TenantContext,
        selector: &DeviceSelector,
        operation: &str,
        mut edit: F,
    ) -> Result<TagUpdate, ReconcileError>
    where
        F: FnMut(&mut DeviceRecord, &mut TagUpdate) -> bool + Send,
    {
        if ctx.is_blank() {
            return Err(ReconcileError::Contract("tenant_id required".to_string()));
        }
        let batch = self.select(ctx, selector).await?;
        let mut update = TagUpdate::default();
        for mut session in batch.into_sessions() {
            if edit(session.record_mut(), &mut update) {
                session.save().await?;
                update.devices_changed += 1;
            }
        }
        for (tag, delta) in &update.counts {
            if *delta != 0 {
                self.counter.adjust(ctx, tag, *delta).await?;
            }
        }
        info!(
            target: "fleet.reconcile",
            tenant_id = %ctx.tenant_id,
            user_id = %ctx.user_id,
            operation,
            devices_changed = update.devices_changed,
            "tags_updated"
        );
        Ok(update)
    }
}
