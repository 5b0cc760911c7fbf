//! 查找接口
//!
//! 所有实现只读，可被多个任务并发调用。

use crate::error::LookupError;
use crate::models::{ConfigFileMeta, FirmwareMeta};
use async_trait::async_trait;
use domain::TenantContext;

/// 配置文件查找（租户作用域）
#[async_trait]
pub trait ConfigLookup: Send + Sync {
    /// 按哈希解析配置文件
    async fn resolve_by_hash(
        &self,
        ctx: &TenantContext,
        hash: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError>;

    /// 该哈希的标准配置是否已登记
    async fn config_exists(&self, ctx: &TenantContext, hash: &str) -> Result<bool, LookupError> {
        Ok(self.resolve_by_hash(ctx, hash).await?.is_some())
    }

    /// 按标题查找任意一个配置文件
    async fn find_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError>;

    /// 按标题查找全部配置文件
    async fn find_all_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Vec<ConfigFileMeta>, LookupError>;
}

/// 固件查找（全局，不分租户）
#[async_trait]
pub trait FirmwareLookup: Send + Sync {
    async fn resolve_by_version(&self, version: &str) -> Result<Option<FirmwareMeta>, LookupError>;
}

pub(crate) fn ensure_tenant(ctx: &TenantContext) -> Result<(), LookupError> {
    if ctx.is_blank() {
        return Err(LookupError::TenantRequired);
    }
    Ok(())
}
