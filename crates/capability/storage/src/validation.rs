//! 验证辅助函数
//!
//! - ensure_tenant：验证租户 ID 非空
//! - ensure_record_tenant：验证写入的记录属于当前租户

use crate::error::StorageError;
use crate::models::DeviceRecord;
use domain::TenantContext;

/// 验证租户 ID 非空
///
/// 确保所有数据访问都有有效的租户上下文。
pub fn ensure_tenant(ctx: &TenantContext) -> Result<(), StorageError> {
    if ctx.is_blank() {
        return Err(StorageError::new("tenant_id required"));
    }
    Ok(())
}

/// 验证记录归属当前租户
pub fn ensure_record_tenant(ctx: &TenantContext, record: &DeviceRecord) -> Result<(), StorageError> {
    ensure_tenant(ctx)?;
    if record.tenant_id != ctx.tenant_id {
        return Err(StorageError::new("tenant mismatch"));
    }
    if record.id.is_empty() {
        return Err(StorageError::new("device id required"));
    }
    Ok(())
}
