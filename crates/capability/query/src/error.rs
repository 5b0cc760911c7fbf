use fleet_lookup::LookupError;
use fleet_storage::StorageError;

/// 查询错误。
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// 调用契约被破坏（例如租户为空），不会访问存储
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("lookup: {0}")]
    Lookup(#[from] LookupError),
}
