use fleet_lookup::LookupError;
use fleet_query::QueryError;
use fleet_storage::StorageError;

/// 对账错误。
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// 调用契约被破坏（租户或序列号为空），不会改动任何状态
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("lookup: {0}")]
    Lookup(#[from] LookupError),
    #[error("query: {0}")]
    Query(#[from] QueryError),
}
