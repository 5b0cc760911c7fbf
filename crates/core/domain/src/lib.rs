pub mod data;
pub mod state;
pub mod tags;

pub use data::{BleState, CommunicationMethod, GeoLocation, PingReport, SatSignal};
pub use state::ConfigurationState;
pub use tags::{is_capability_tag, normalize_tag, split_tags};

/// 租户上下文：所有模块共享的执行上下文。
///
/// `tenant_id` 选择设备集合的逻辑分区；`user_id` 仅用于日志归因。
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub user_id: String,
}

impl TenantContext {
    /// 构造显式身份的租户上下文。
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }

    /// 后台任务（心跳对账等）使用的系统身份。
    pub fn system(tenant_id: impl Into<String>) -> Self {
        Self::new(tenant_id, "system")
    }

    /// 租户标识是否为空白（契约违例）。
    pub fn is_blank(&self) -> bool {
        self.tenant_id.trim().is_empty()
    }
}

impl Default for TenantContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self {
            tenant_id: "".to_string(),
            user_id: "".to_string(),
        }
    }
}
