//! 心跳对账服务
//!
//! 一次心跳的完整处理：按序列号读取（或新建）记录 → 合并 → 写回读出的存储。
//! 同一设备的并发心跳不加锁，以存储的 upsert 语义后写者胜。

use crate::error::ReconcileError;
use crate::merge::PingMerger;
use domain::{CommunicationMethod, ConfigurationState, PingReport, TenantContext};
use fleet_storage::{DeviceRecord, DeviceSession, DeviceStore, StorageError};
use fleet_telemetry::{
    AlertKind, raise_alert, record_device_created, record_harvest_requested, record_lockout_set,
    record_ping_merged, record_ping_received,
};
use std::sync::Arc;
use tracing::{info, warn};

/// 一次心跳处理的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingOutcome {
    pub device_id: String,
    /// 本次心跳新建了设备记录
    pub created: bool,
    pub requires_harvest: bool,
    /// 本次设置的节流截止时间
    pub lockout_until_ms: Option<i64>,
    /// 处理时设备是否仍在节流期内（仅供调用方参考）
    pub locked_out: bool,
}

/// 心跳对账服务
#[derive(Clone)]
pub struct ReconcileService {
    store: Arc<dyn DeviceStore>,
    merger: PingMerger,
}

fn storage_failure(operation: &str, err: StorageError) -> ReconcileError {
    warn!(target: "fleet.reconcile", operation, error = %err, "storage_failed");
    raise_alert(AlertKind::Warning, &format!("{operation} failed: {err}"));
    ReconcileError::Storage(err)
}

impl ReconcileService {
    pub fn new(store: Arc<dyn DeviceStore>, merger: PingMerger) -> Self {
        Self { store, merger }
    }

    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// 处理一次心跳。
    pub async fn ingest_ping(
        &self,
        ctx: &TenantContext,
        report: &PingReport,
        method: CommunicationMethod,
    ) -> Result<PingOutcome, ReconcileError> {
        if ctx.is_blank() {
            return Err(ReconcileError::Contract("tenant_id required".to_string()));
        }
        let serial_number = report.serial_number.trim();
        if serial_number.is_empty() {
            return Err(ReconcileError::Contract("serial_number required".to_string()));
        }
        record_ping_received();

        let loaded = DeviceSession::load_by_serial(self.store.clone(), ctx, serial_number)
            .await
            .map_err(|err| storage_failure("load_by_serial", err))?;
        let (mut session, created) = match loaded {
            Some(session) => (session, false),
            None => {
                let mut record = DeviceRecord::new(
                    uuid::Uuid::new_v4().to_string(),
                    ctx.tenant_id.clone(),
                    serial_number,
                );
                record.state = ConfigurationState::New;
                (
                    DeviceSession::new(self.store.clone(), ctx.clone(), record),
                    true,
                )
            }
        };

        let now_ms = self.merger.clock().now_ms();
        let locked_out = session
            .record()
            .lockout_until_ms
            .is_some_and(|until| until > now_ms);

        let record = std::mem::take(session.record_mut());
        let outcome = self.merger.merge_ping(ctx, record, report, method).await?;
        session.replace_record(outcome.record);
        session
            .save()
            .await
            .map_err(|err| storage_failure("upsert", err))?;

        record_ping_merged();
        if created {
            record_device_created();
        }
        if outcome.requires_harvest {
            record_harvest_requested();
        }
        if outcome.lockout_set {
            record_lockout_set();
        }

        let record = session.record();
        info!(
            target: "fleet.reconcile",
            tenant_id = %ctx.tenant_id,
            device_id = %record.id,
            serial_number,
            created,
            requires_harvest = outcome.requires_harvest,
            recent_pings = record.recent_pings_count,
            "ping_merged"
        );

        Ok(PingOutcome {
            device_id: record.id.clone(),
            created,
            requires_harvest: outcome.requires_harvest,
            lockout_until_ms: if outcome.lockout_set {
                record.lockout_until_ms
            } else {
                None
            },
            locked_out,
        })
    }

    /// 删除设备记录；不存在时返回 false。
    pub async fn delete_device(&self, ctx: &TenantContext, id: &str) -> Result<bool, ReconcileError> {
        if ctx.is_blank() {
            return Err(ReconcileError::Contract("tenant_id required".to_string()));
        }
        let Some(session) = DeviceSession::load(self.store.clone(), ctx, id)
            .await
            .map_err(|err| storage_failure("load_by_id", err))?
        else {
            return Ok(false);
        };
        let deleted = session
            .delete()
            .await
            .map_err(|err| storage_failure("delete", err))?;
        info!(target: "fleet.reconcile", tenant_id = %ctx.tenant_id, device_id = id, deleted, "device_deleted");
        Ok(deleted)
    }
}
