//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    /// 分页查询的默认页大小（调用方传 0 时使用）
    pub page_size: usize,
    /// 全量扫描的页大小
    pub large_page_size: usize,
    /// 全量扫描最多往返次数，None 表示不限
    pub scan_max_pages: Option<usize>,
    pub lookup_cache_ttl_seconds: u64,
    pub lookup_cache_capacity: usize,
    /// 心跳信封缺少租户时使用
    pub default_tenant: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置。
    pub fn from_source<F>(source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = read_optional(&source, "FLEET_DATABASE_URL")
            .ok_or_else(|| ConfigError::Missing("FLEET_DATABASE_URL".to_string()))?;
        let redis_url = read_optional(&source, "FLEET_REDIS_URL")
            .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());
        let page_size = read_usize_with_default(&source, "FLEET_PAGE_SIZE", 20)?.max(1);
        let large_page_size =
            read_usize_with_default(&source, "FLEET_LARGE_PAGE_SIZE", 500)?.max(1);
        let scan_max_pages =
            read_optional_usize(&source, "FLEET_SCAN_MAX_PAGES")?.filter(|value| *value > 0);
        let lookup_cache_ttl_seconds =
            read_u64_with_default(&source, "FLEET_LOOKUP_CACHE_TTL_SECONDS", 300)?;
        let lookup_cache_capacity =
            read_usize_with_default(&source, "FLEET_LOOKUP_CACHE_CAPACITY", 10_000)?;
        let default_tenant = read_optional(&source, "FLEET_DEFAULT_TENANT");

        Ok(Self {
            database_url,
            redis_url,
            page_size,
            large_page_size,
            scan_max_pages,
            lookup_cache_ttl_seconds,
            lookup_cache_capacity,
            default_tenant,
        })
    }
}

fn read_optional<F>(source: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match source(key) {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn read_u64_with_default<F>(source: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = read_optional(source, key) else {
        return Ok(default);
    };
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default<F>(source: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(read_optional_usize(source, key)?.unwrap_or(default))
}

fn read_optional_usize<F>(source: &F, key: &str) -> Result<Option<usize>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = read_optional(source, key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<usize>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}
