//! 查找层错误类型

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("tenant_id required")]
    TenantRequired,
    #[error("lookup backend: {0}")]
    Backend(String),
    #[error("lookup payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for LookupError {
    fn from(err: ::redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}
