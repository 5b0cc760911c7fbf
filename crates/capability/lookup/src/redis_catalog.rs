//! Redis 查找目录
//!
//! 键布局：
//! - `tenant:{t}:config:hash:{h}`：ConfigFileMeta JSON
//! - `tenant:{t}:config:title:{title}`：该标题下所有哈希的集合
//! - `firmware:version:{v}`：FirmwareMeta JSON

use crate::error::LookupError;
use crate::models::{ConfigFileMeta, FirmwareMeta};
use crate::traits::{ConfigLookup, FirmwareLookup, ensure_tenant};
use domain::TenantContext;
use redis::AsyncCommands;

fn config_hash_key(tenant_id: &str, hash: &str) -> String {
    format!("tenant:{}:config:hash:{}", tenant_id, hash)
}

fn config_title_key(tenant_id: &str, title: &str) -> String {
    format!("tenant:{}:config:title:{}", tenant_id, title)
}

fn firmware_key(version: &str) -> String {
    format!("firmware:version:{}", version)
}

/// Redis 配置文件目录
pub struct RedisConfigCatalog {
    client: redis::Client,
}

impl RedisConfigCatalog {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn connect(redis_url: &str) -> Result<Self, LookupError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client))
    }

    /// 登记配置文件：写入载荷并加入标题索引。
    pub async fn register(&self, tenant_id: &str, meta: &ConfigFileMeta) -> Result<(), LookupError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data = serde_json::to_string(meta)?;
        connection
            .set::<_, _, ()>(config_hash_key(tenant_id, &meta.hash), data)
            .await?;
        connection
            .sadd::<_, _, ()>(config_title_key(tenant_id, &meta.title), &meta.hash)
            .await?;
        Ok(())
    }

    async fn load_hashes(
        &self,
        connection: &mut redis::aio::MultiplexedConnection,
        tenant_id: &str,
        hashes: Vec<String>,
    ) -> Result<Vec<ConfigFileMeta>, LookupError> {
        let mut items = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let data: Option<String> = connection.get(config_hash_key(tenant_id, &hash)).await?;
            // 标题索引可能比载荷多活一会儿，缺失的直接跳过
            let Some(data) = data else {
                continue;
            };
            items.push(serde_json::from_str(&data)?);
        }
        Ok(items)
    }
}

#[async_trait::async_trait]
impl ConfigLookup for RedisConfigCatalog {
    async fn resolve_by_hash(
        &self,
        ctx: &TenantContext,
        hash: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        ensure_tenant(ctx)?;
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data: Option<String> = connection.get(config_hash_key(&ctx.tenant_id, hash)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn config_exists(&self, ctx: &TenantContext, hash: &str) -> Result<bool, LookupError> {
        ensure_tenant(ctx)?;
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let exists: bool = connection.exists(config_hash_key(&ctx.tenant_id, hash)).await?;
        Ok(exists)
    }

    async fn find_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        Ok(self.find_all_by_title(ctx, title).await?.into_iter().next())
    }

    async fn find_all_by_title(
        &self,
        ctx: &TenantContext,
        title: &str,
    ) -> Result<Vec<ConfigFileMeta>, LookupError> {
        ensure_tenant(ctx)?;
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let mut hashes: Vec<String> = connection
            .smembers(config_title_key(&ctx.tenant_id, title))
            .await?;
        hashes.sort();
        self.load_hashes(&mut connection, &ctx.tenant_id, hashes).await
    }
}

/// Redis 固件目录
pub struct RedisFirmwareCatalog {
    client: redis::Client,
}

impl RedisFirmwareCatalog {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn connect(redis_url: &str) -> Result<Self, LookupError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client))
    }

    pub async fn register(&self, meta: &FirmwareMeta) -> Result<(), LookupError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data = serde_json::to_string(meta)?;
        connection
            .set::<_, _, ()>(firmware_key(&meta.version), data)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl FirmwareLookup for RedisFirmwareCatalog {
    async fn resolve_by_version(&self, version: &str) -> Result<Option<FirmwareMeta>, LookupError> {
        let mut connection = self.client.get_multiplexed_tokio_connection().await?;
        let data: Option<String> = connection.get(firmware_key(version)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }
}
