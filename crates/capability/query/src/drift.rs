//! 漂移报告
//!
//! 设备最近上报的固件 / 增量配置与期望目标不一致即为漂移。
//! 期望值未设置时不算漂移。

use crate::error::QueryError;
use crate::model::DeviceQuery;
use crate::scanner::DeviceScanner;
use domain::TenantContext;
use fleet_storage::DeviceRecord;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriftKind {
    ApplicationFirmware,
    BluetoothFirmware,
    SupervisorFirmware,
    DeltaConfiguration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDrift {
    pub device_id: String,
    pub serial_number: Option<String>,
    pub kinds: Vec<DriftKind>,
}

/// 各类漂移的设备数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriftSummary {
    pub devices_scanned: usize,
    pub drifting_devices: usize,
    pub application_firmware: usize,
    pub bluetooth_firmware: usize,
    pub supervisor_firmware: usize,
    pub delta_configuration: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetDrift {
    pub devices: Vec<DeviceDrift>,
    pub summary: DriftSummary,
}

fn differs(reported: &Option<String>, desired: &Option<String>) -> bool {
    match desired.as_deref().filter(|value| !value.trim().is_empty()) {
        Some(desired) => reported.as_deref() != Some(desired),
        None => false,
    }
}

/// 单台设备的漂移；无漂移返回 None。
pub fn drift_for(record: &DeviceRecord) -> Option<DeviceDrift> {
    let checks = [
        (
            DriftKind::ApplicationFirmware,
            &record.last_reported_application_firmware,
            &record.desired_application_firmware,
        ),
        (
            DriftKind::BluetoothFirmware,
            &record.last_reported_bluetooth_firmware,
            &record.desired_bluetooth_firmware,
        ),
        (
            DriftKind::SupervisorFirmware,
            &record.last_reported_supervisor_firmware,
            &record.desired_supervisor_firmware,
        ),
        (
            DriftKind::DeltaConfiguration,
            &record.last_reported_delta_configuration_hash,
            &record.desired_delta_configuration_hash,
        ),
    ];
    let kinds: Vec<DriftKind> = checks
        .into_iter()
        .filter(|(_, reported, desired)| differs(reported, desired))
        .map(|(kind, _, _)| kind)
        .collect();
    if kinds.is_empty() {
        return None;
    }
    Some(DeviceDrift {
        device_id: record.id.clone(),
        serial_number: record.serial_number.clone(),
        kinds,
    })
}

/// 全车队漂移报告
pub struct DriftReporter {
    scanner: Arc<DeviceScanner>,
}

impl DriftReporter {
    pub fn new(scanner: Arc<DeviceScanner>) -> Self {
        Self { scanner }
    }

    /// 对匹配查询的全部设备计算漂移。
    pub async fn fleet_drift(
        &self,
        ctx: &TenantContext,
        query: &DeviceQuery,
    ) -> Result<FleetDrift, QueryError> {
        let scan = self.scanner.scan_all(ctx, query).await?;
        let mut report = FleetDrift::default();
        report.summary.devices_scanned = scan.records.len();
        for record in &scan.records {
            let Some(drift) = drift_for(record) else {
                continue;
            };
            for kind in &drift.kinds {
                match kind {
                    DriftKind::ApplicationFirmware => report.summary.application_firmware += 1,
                    DriftKind::BluetoothFirmware => report.summary.bluetooth_firmware += 1,
                    DriftKind::SupervisorFirmware => report.summary.supervisor_firmware += 1,
                    DriftKind::DeltaConfiguration => report.summary.delta_configuration += 1,
                }
            }
            report.devices.push(drift);
        }
        report.summary.drifting_devices = report.devices.len();
        info!(
            target: "fleet.query",
            tenant_id = %ctx.tenant_id,
            scanned = report.summary.devices_scanned,
            drifting = report.summary.drifting_devices,
            "fleet_drift_reported"
        );
        Ok(report)
    }
}
