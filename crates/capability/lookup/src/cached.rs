//! 读穿透缓存
//!
//! 只缓存命中结果（带容量上限和 TTL）；未命中不缓存，
//! 下一次询问总会回源。

use crate::error::LookupError;
use crate::models::{ConfigFileMeta, FirmwareMeta};
use crate::traits::{ConfigLookup, FirmwareLookup};
use domain::TenantContext;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// 缓存参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub capacity: usize,
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }
}

struct MemoCache<K, V> {
    entries: Mutex<HashMap<K, (Instant, V)>>,
    policy: CachePolicy,
}

impl<K: Eq + Hash + Clone, V: Clone> MemoCache<K, V> {
    fn new(policy: CachePolicy) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            policy,
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let (stored_at, value) = entries.get(key)?;
        if stored_at.elapsed() < self.policy.ttl {
            return Some(value.clone());
        }
        entries.remove(key);
        None
    }

    fn put(&self, key: K, value: V) {
        if self.policy.capacity == 0 || self.policy.ttl.is_zero() {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.policy.capacity && !entries.contains_key(&key) {
            let ttl = self.policy.ttl;
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        }
        if entries.len() >= self.policy.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, (Instant::now(), value));
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or_default()
    }
}

/// 配置查找的读穿透缓存
pub struct CachedConfigLookup {
    inner: Arc<dyn ConfigLookup>,
    by_hash: MemoCache<(String, String), ConfigFileMeta>,
    by_title: MemoCache<(String, String), ConfigFileMeta>,
}

impl CachedConfigLookup {
    pub fn new(inner: Arc<dyn ConfigLookup>, policy: CachePolicy) -> Self {
        Self {
            inner,
            by_hash: MemoCache::new(policy),
            by_title: MemoCache::new(policy),
        }
    }

    /// 当前缓存的哈希条目数
    pub fn cached_hashes(&self) -> usize {
        self.by_hash.len()
    }
}

#[async_trait::async_trait]
impl ConfigLookup for CachedConfigLookup {
    async fn resolve_by_hash(
        &self,
        ctx: &TenantContext,
        hash: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        let key = (ctx.tenant_id.clone(), hash.to_string());
        if let Some(meta) = self.by_hash.get(&key) {
            return Ok(Some(meta));
        }
        let found = self.inner.resolve_by_hash(ctx, hash).await?;
        if let Some(meta) = &found {
            debug!(target: "fleet.lookup", tenant_id = %ctx.tenant_id, hash, "config_cached");
            self.by_hash.put(key, meta.clone());
        }
        Ok(found)
    }

    async fn config_exists(&self, ctx: &TenantContext, hash: &str) -> Result<bool, LookupError> {
        let key = (ctx.tenant_id.clone(), hash.to_string());
        if self.by_hash.get(&key).is_some() {
            return Ok(true);
        }
        self.inner.config_exists(ctx, hash).await
    }

    async fn find_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        let key = (ctx.tenant_id.clone(), title.to_string());
        if let Some(meta) = self.by_title.get(&key) {
            return Ok(Some(meta));
        }
        let found = self.inner.find_by_title(ctx, title).await?;
        if let Some(meta) = &found {
            self.by_title.put(key, meta.clone());
        }
        Ok(found)
    }

    async fn find_all_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Vec<ConfigFileMeta>, LookupError> {
        // 同一标题会不断新增版本，集合查询不缓存
        self.inner.find_all_by_title(ctx, title).await
    }
}

/// 固件查找的读穿透缓存
pub struct CachedFirmwareLookup {
    inner: Arc<dyn FirmwareLookup>,
    by_version: MemoCache<String, FirmwareMeta>,
}

impl CachedFirmwareLookup {
    pub fn new(inner: Arc<dyn FirmwareLookup>, policy: CachePolicy) -> Self {
        Self {
            inner,
            by_version: MemoCache::new(policy),
        }
    }

    pub fn cached_versions(&self) -> usize {
        self.by_version.len()
    }
}

#[async_trait::async_trait]
impl FirmwareLookup for CachedFirmwareLookup {
    async fn resolve_by_version(&self, version: &str) -> Result<Option<FirmwareMeta>, LookupError> {
        let key = version.to_string();
        if let Some(meta) = self.by_version.get(&key) {
            return Ok(Some(meta));
        }
        let found = self.inner.resolve_by_version(version).await?;
        if let Some(meta) = &found {
            self.by_version.put(key, meta.clone());
        }
        Ok(found)
    }
}
