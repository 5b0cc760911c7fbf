//! 内存查找目录
//!
//! harvest 结果和测试通过 `register` 写入。

use crate::error::LookupError;
use crate::models::{ConfigFileMeta, FirmwareMeta};
use crate::traits::{ConfigLookup, FirmwareLookup, ensure_tenant};
use domain::TenantContext;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// 配置文件目录：(租户, 哈希) → 元数据
#[derive(Default)]
pub struct InMemoryConfigCatalog {
    configs: RwLock<BTreeMap<(String, String), ConfigFileMeta>>,
}

impl InMemoryConfigCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记（或替换）一个配置文件。
    pub fn register(&self, tenant_id: &str, meta: ConfigFileMeta) {
        if let Ok(mut map) = self.configs.write() {
            map.insert((tenant_id.to_string(), meta.hash.clone()), meta);
        }
    }

    fn tenant_configs(&self, tenant_id: &str) -> Result<Vec<ConfigFileMeta>, LookupError> {
        let map = self
            .configs
            .read()
            .map_err(|_| LookupError::Backend("lock failed".to_string()))?;
        Ok(map
            .iter()
            .filter(|((tenant, _), _)| tenant == tenant_id)
            .map(|(_, meta)| meta.clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl ConfigLookup for InMemoryConfigCatalog {
    async fn resolve_by_hash(
        &self,
        ctx: &TenantContext,
        hash: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        ensure_tenant(ctx)?;
        let map = self
            .configs
            .read()
            .map_err(|_| LookupError::Backend("lock failed".to_string()))?;
        Ok(map.get(&(ctx.tenant_id.clone(), hash.to_string())).cloned())
    }

    async fn find_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        ensure_tenant(ctx)?;
        Ok(self
            .tenant_configs(&ctx.tenant_id)?
            .into_iter()
            .find(|meta| meta.title == title))
    }

    async fn find_all_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Vec<ConfigFileMeta>, LookupError> {
        ensure_tenant(ctx)?;
        Ok(self
            .tenant_configs(&ctx.tenant_id)?
            .into_iter()
            .filter(|meta| meta.title == title)
            .collect())
    }
}

/// 固件目录：版本 → 元数据
#[derive(Default)]
pub struct InMemoryFirmwareCatalog {
    firmware: RwLock<HashMap<String, FirmwareMeta>>,
}

impl InMemoryFirmwareCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, meta: FirmwareMeta) {
        if let Ok(mut map) = self.firmware.write() {
            map.insert(meta.version.clone(), meta);
        }
    }
}

#[async_trait::async_trait]
impl FirmwareLookup for InMemoryFirmwareCatalog {
    async fn resolve_by_version(&self, version: &str) -> Result<Option<FirmwareMeta>, LookupError> {
        let map = self
            .firmware
            .read()
            .map_err(|_| LookupError::Backend("lock failed".to_string()))?;
        Ok(map.get(version).cloned())
    }
}
