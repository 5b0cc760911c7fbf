//! 心跳信封：接入层转发给 worker 的一行 NDJSON。

use domain::{CommunicationMethod, PingReport, TenantContext};
use serde::Deserialize;

/// 信封解析错误。
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
    /// 信封和配置都没有给出租户
    #[error("tenant_id required")]
    MissingTenant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingEnvelope {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub method: CommunicationMethod,
    pub report: PingReport,
}

impl PingEnvelope {
    /// 解析一行；空行返回 None。
    pub fn parse(line: &str) -> Result<Option<Self>, EnvelopeError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(line)?))
    }

    /// 信封里的租户优先，缺失时退回默认租户。
    pub fn context(&self, default_tenant: Option<&str>) -> Result<TenantContext, EnvelopeError> {
        let tenant_id = self
            .tenant_id
            .as_deref()
            .filter(|tenant| !tenant.trim().is_empty())
            .or(default_tenant)
            .ok_or(EnvelopeError::MissingTenant)?;
        Ok(TenantContext::system(tenant_id))
    }
}
