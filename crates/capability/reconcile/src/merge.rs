//! 心跳合并
//!
//! 字段规则：
//! - 数值 / 布尔遥测、位置：每次覆盖
//! - 字符串遥测（VIN、ICCID、IMEI、MSISDN、网络参数、增量参数块）：非空白才覆盖
//! - 卫星信号、能力集：非空才整体替换
//! - 标准配置哈希：变化或标题未解析时更新；新哈希未登记时要求 harvest
//! - 增量配置哈希：同样的触发条件；"0" 清空引用和标题，否则尝试解析
//! - 固件版本：与存储的字符串形式比较，变化时更新并尝试解析
//! - 心跳计数：距上次联系 24 小时内累加近期计数，否则归零；超过 3 次设置一天的节流截止时间
//!
//! 查找未命中不是错误，标题保持原样。

use crate::clock::Clock;
use crate::error::ReconcileError;
use domain::{CommunicationMethod, PingReport, TenantContext};
use fleet_lookup::{ConfigLookup, FirmwareLookup};
use fleet_storage::DeviceRecord;
use fleet_telemetry::{AlertKind, raise_alert, record_merge_failure};
use std::sync::Arc;
use tracing::debug;

/// 增量配置哈希的“无增量”哨兵值
pub const NO_DELTA_HASH: &str = "0";

/// 近期心跳窗口
pub const RECENT_PING_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

/// 近期心跳超过该次数时设置节流
pub const RECENT_PING_LIMIT: i32 = 3;

/// 节流时长
pub const LOCKOUT_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

/// 合并结果。
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub record: DeviceRecord,
    /// 新上报的标准配置哈希未登记，需要 harvest
    pub requires_harvest: bool,
    /// 本次合并设置了节流截止时间
    pub lockout_set: bool,
}

/// 心跳合并引擎
#[derive(Clone)]
pub struct PingMerger {
    configs: Arc<dyn ConfigLookup>,
    firmware: Arc<dyn FirmwareLookup>,
    clock: Arc<dyn Clock>,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|value| !value.trim().is_empty())
}

fn overwrite_if_filled(target: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = filled(value) {
        *target = Some(value.to_string());
    }
}

impl PingMerger {
    pub fn new(
        configs: Arc<dyn ConfigLookup>,
        firmware: Arc<dyn FirmwareLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            configs,
            firmware,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// 把心跳合并进记录。
    ///
    /// 失败时记录 Warning 告警后返回错误；记录可能已被部分修改，
    /// 调用方应在重试前重新读取。
    pub async fn merge_ping(
        &self,
        ctx: &TenantContext,
        record: DeviceRecord,
        report: &PingReport,
        method: CommunicationMethod,
    ) -> Result<MergeOutcome, ReconcileError> {
        if ctx.is_blank() {
            return Err(ReconcileError::Contract("tenant_id required".to_string()));
        }
        if report.serial_number.trim().is_empty() {
            return Err(ReconcileError::Contract("serial_number required".to_string()));
        }
        match self.apply(ctx, record, report, method).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                record_merge_failure();
                raise_alert(
                    AlertKind::Warning,
                    &format!(
                        "ping merge failed for serial {}: {err}",
                        report.serial_number
                    ),
                );
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        ctx: &TenantContext,
        mut record: DeviceRecord,
        report: &PingReport,
        method: CommunicationMethod,
    ) -> Result<MergeOutcome, ReconcileError> {
        apply_telemetry(&mut record, report);
        record.communication_method = method;

        let requires_harvest = self.merge_standard_hash(ctx, &mut record, report).await?;
        self.merge_delta_hash(ctx, &mut record, report).await?;
        self.merge_firmware(&mut record, report).await?;

        if !report.capabilities.is_empty() {
            record.capabilities = report.capabilities.clone();
        }

        let lockout_set = self.merge_ping_counters(&mut record, report.ping_time_ms);

        Ok(MergeOutcome {
            record,
            requires_harvest,
            lockout_set,
        })
    }

    async fn merge_standard_hash(
        &self,
        ctx: &TenantContext,
        record: &mut DeviceRecord,
        report: &PingReport,
    ) -> Result<bool, ReconcileError> {
        let Some(hash) = filled(&report.standard_hash) else {
            return Ok(false);
        };
        let changed = record.last_reported_standard_configuration_hash.as_deref() != Some(hash);
        if !changed && record.standard_configuration_title.is_some() {
            return Ok(false);
        }
        record.last_reported_standard_configuration_hash = Some(hash.to_string());
        let requires_harvest = !self.configs.config_exists(ctx, hash).await?;
        if requires_harvest {
            debug!(target: "fleet.reconcile", tenant_id = %ctx.tenant_id, hash, "standard_config_unknown");
            return Ok(true);
        }
        if let Some(meta) = self.configs.resolve_by_hash(ctx, hash).await? {
            record.last_reported_standard_configuration = Some(meta.id);
            record.standard_configuration_title = Some(meta.title);
        }
        Ok(false)
    }

    async fn merge_delta_hash(
        &self,
        ctx: &TenantContext,
        record: &mut DeviceRecord,
        report: &PingReport,
    ) -> Result<(), ReconcileError> {
        let Some(hash) = filled(&report.delta_hash) else {
            return Ok(());
        };
        let changed = record.last_reported_delta_configuration_hash.as_deref() != Some(hash);
        if !changed && record.delta_configuration_title.is_some() {
            return Ok(());
        }
        record.last_reported_delta_configuration_hash = Some(hash.to_string());
        if hash == NO_DELTA_HASH {
            record.last_reported_delta_configuration = None;
            record.delta_configuration_title = None;
            return Ok(());
        }
        if let Some(meta) = self.configs.resolve_by_hash(ctx, hash).await? {
            record.last_reported_delta_configuration = Some(meta.id);
            record.delta_configuration_title = Some(meta.title);
        }
        Ok(())
    }

    async fn merge_firmware(
        &self,
        record: &mut DeviceRecord,
        report: &PingReport,
    ) -> Result<(), ReconcileError> {
        let bluetooth = report.ble_version.to_string();
        if record.bluetooth_firmware_version.as_deref() != Some(bluetooth.as_str()) {
            if let Some(meta) = self.firmware.resolve_by_version(&bluetooth).await? {
                record.bluetooth_firmware_version_title = Some(meta.title);
                record.last_reported_bluetooth_firmware = Some(meta.id);
            }
            record.bluetooth_firmware_version = Some(bluetooth);
        }

        let supervisor = report.supervisor_version.to_string();
        if record.supervisor_firmware_version.as_deref() != Some(supervisor.as_str()) {
            if let Some(meta) = self.firmware.resolve_by_version(&supervisor).await? {
                record.supervisor_firmware_version_title = Some(meta.title);
                record.last_reported_supervisor_firmware = Some(meta.id);
            }
            record.supervisor_firmware_version = Some(supervisor);
        }

        if let Some(application) = filled(&report.application_version)
            && record.application_firmware_version.as_deref() != Some(application)
        {
            if let Some(meta) = self.firmware.resolve_by_version(application).await? {
                record.application_firmware_version_title = Some(meta.title);
                record.last_reported_application_firmware = Some(meta.id);
            }
            record.application_firmware_version = Some(application.to_string());
        }
        Ok(())
    }

    /// 更新心跳计数，返回是否设置了节流。
    fn merge_ping_counters(&self, record: &mut DeviceRecord, ping_time_ms: i64) -> bool {
        record.ping_count += 1;
        let recent = record
            .last_contact_ms
            .is_some_and(|last| {
                last.abs_diff(ping_time_ms) < RECENT_PING_WINDOW_MS.unsigned_abs()
            });
        if recent {
            record.recent_pings_count += 1;
        } else {
            record.recent_pings_count = 0;
        }
        let lockout_set = record.recent_pings_count > RECENT_PING_LIMIT;
        if lockout_set {
            record.lockout_until_ms = Some(self.clock.now_ms() + LOCKOUT_DURATION_MS);
        }
        record.last_contact_ms = Some(ping_time_ms);
        lockout_set
    }
}

/// 不需要查找的遥测字段。
fn apply_telemetry(record: &mut DeviceRecord, report: &PingReport) {
    record.last_known_location = report.location;
    record.location_age_min = report.location_age_min;
    overwrite_if_filled(&mut record.vin, &report.vin);

    record.is_high_voltage = report.is_high_voltage;
    record.is_1939_app_support = report.is_1939_app_support;
    record.is_1939_supervisor_support = report.is_1939_supervisor_support;
    record.is_1708_app_support = report.is_1708_app_support;
    record.is_1708_supervisor_support = report.is_1708_supervisor_support;
    record.ble_state = report.ble_state;
    record.modem_firmware_version = report.modem_firmware_version;
    record.board_version = report.board_version;
    record.customer_application_version = report.customer_application_version;
    record.sim_type = report.sim_type;

    overwrite_if_filled(&mut record.iccid, &report.iccid);
    overwrite_if_filled(&mut record.msisdn, &report.msisdn);
    overwrite_if_filled(&mut record.imei, &report.imei);

    record.external_voltage = report.external_voltage;
    record.battery_voltage = report.battery_voltage;
    record.modem_switcher = report.modem_switcher;
    record.thermistor = report.thermistor;
    record.command_count = report.command_count;
    record.gps_state = report.gps_state;
    record.gsa_fix_mode = report.gsa_fix_mode;
    record.gsv_sats_tracking = report.gsv_sats_tracking;
    record.num_sats = report.num_sats;
    if !report.sat_signals.is_empty() {
        record.sat_signals = report.sat_signals.clone();
    }

    record.gsm_reg = report.gsm_reg;
    record.gprs_reg = report.gprs_reg;
    record.rssi = report.rssi;
    record.gprs_attached = report.gprs_attached;
    record.is_gprs_active = report.is_gprs_active;
    overwrite_if_filled(&mut record.network_mode, &report.network_mode);
    overwrite_if_filled(&mut record.mcc, &report.mcc);
    overwrite_if_filled(&mut record.mnc, &report.mnc);
    overwrite_if_filled(&mut record.lac, &report.lac);
    overwrite_if_filled(&mut record.operator, &report.operator);
    overwrite_if_filled(&mut record.band, &report.band);

    record.can_type = report.can_type;
    record.bus_mode = report.bus_mode;
    record.node_type = report.node_type;
    record.baud_rate = report.baud_rate;

    overwrite_if_filled(&mut record.delta_parameters, &report.delta_parameters);
}
