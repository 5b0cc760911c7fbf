//! 心跳对账 worker：从 stdin 读取 NDJSON 心跳信封，逐行合并进设备记录。

mod envelope;

use envelope::PingEnvelope;
use fleet_config::AppConfig;
use fleet_lookup::{
    CachePolicy, CachedConfigLookup, CachedFirmwareLookup, ConfigLookup, RedisConfigCatalog,
    RedisFirmwareCatalog,
};
use fleet_query::{DeviceQuery, DeviceScanner, DriftReporter, PredicateCompiler, ScanConfig};
use fleet_reconcile::{PingMerger, ReconcileService, SystemClock};
use fleet_storage::{DeviceStore, IndexField, PgDeviceStore};
use fleet_telemetry::{init_tracing, metrics, new_request_ids};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{Instrument, info, warn};

/// 一次输入流处理的统计。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct LineStats {
    ingested: usize,
    skipped: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 设备存储：建表 + 默认索引
    let store = PgDeviceStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;
    store.ensure_indexes(&IndexField::DEVICE_DEFAULTS).await?;
    let store: Arc<dyn DeviceStore> = Arc::new(store);

    // 查找目录：Redis + 进程内读穿透缓存
    let policy = CachePolicy::new(
        config.lookup_cache_capacity,
        Duration::from_secs(config.lookup_cache_ttl_seconds),
    );
    let configs: Arc<dyn ConfigLookup> = Arc::new(CachedConfigLookup::new(
        Arc::new(RedisConfigCatalog::connect(&config.redis_url)?),
        policy,
    ));
    let firmware = CachedFirmwareLookup::new(
        Arc::new(RedisFirmwareCatalog::connect(&config.redis_url)?),
        policy,
    );
    let merger = PingMerger::new(configs.clone(), Arc::new(firmware), Arc::new(SystemClock));
    let service = ReconcileService::new(store.clone(), merger);
    let scanner = Arc::new(DeviceScanner::new(
        store,
        PredicateCompiler::new(configs),
        ScanConfig::from(&config),
    ));

    info!(target: "fleet.worker", "worker_started");
    let stats = process_lines(BufReader::new(tokio::io::stdin()), &service, &config).await?;

    let snapshot = metrics().snapshot();
    info!(
        target: "fleet.worker",
        lines_ingested = stats.ingested,
        lines_skipped = stats.skipped,
        pings_received = snapshot.pings_received,
        pings_merged = snapshot.pings_merged,
        devices_created = snapshot.devices_created,
        harvest_requested = snapshot.harvest_requested,
        merge_failures = snapshot.merge_failures,
        "worker_stopped"
    );

    // 默认租户的固件/配置漂移摘要
    if let Some(tenant_id) = config.default_tenant.as_deref() {
        let ctx = domain::TenantContext::system(tenant_id);
        match DriftReporter::new(scanner)
            .fleet_drift(&ctx, &DeviceQuery::all())
            .await
        {
            Ok(report) => info!(
                target: "fleet.worker",
                tenant_id,
                scanned = report.summary.devices_scanned,
                drifting = report.summary.drifting_devices,
                application_firmware = report.summary.application_firmware,
                bluetooth_firmware = report.summary.bluetooth_firmware,
                supervisor_firmware = report.summary.supervisor_firmware,
                delta_configuration = report.summary.delta_configuration,
                "fleet_drift_summary"
            ),
            Err(err) => warn!(target: "fleet.worker", tenant_id, error = %err, "fleet_drift_failed"),
        }
    }
    Ok(())
}

/// 逐行处理输入流；非 UTF-8 或无法解析的行记录后跳过。
async fn process_lines<R>(
    mut reader: R,
    service: &ReconcileService,
    config: &AppConfig,
) -> std::io::Result<LineStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = LineStats::default();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let ids = new_request_ids();
        let span = tracing::info_span!(
            "ping",
            request_id = %ids.request_id,
            trace_id = %ids.trace_id
        );
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(err) => {
                span.in_scope(|| {
                    warn!(target: "fleet.worker", error = %err, "envelope_skipped");
                });
                stats.skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        if handle_line(service, config, line).instrument(span).await {
            stats.ingested += 1;
        } else {
            stats.skipped += 1;
        }
    }
    Ok(stats)
}

/// 处理一行；合并成功返回 true。
async fn handle_line(service: &ReconcileService, config: &AppConfig, line: &str) -> bool {
    let envelope = match PingEnvelope::parse(line) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => return false,
        Err(err) => {
            warn!(target: "fleet.worker", error = %err, "envelope_skipped");
            return false;
        }
    };
    let ctx = match envelope.context(config.default_tenant.as_deref()) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(
                target: "fleet.worker",
                serial_number = %envelope.report.serial_number,
                error = %err,
                "envelope_skipped"
            );
            return false;
        }
    };
    match service
        .ingest_ping(&ctx, &envelope.report, envelope.method)
        .await
    {
        Ok(outcome) => {
            if outcome.requires_harvest {
                info!(
                    target: "fleet.worker",
                    tenant_id = %ctx.tenant_id,
                    device_id = %outcome.device_id,
                    hash = envelope.report.standard_hash.as_deref().unwrap_or(""),
                    "harvest_requested"
                );
            }
            if let Some(until) = outcome.lockout_until_ms {
                warn!(
                    target: "fleet.worker",
                    tenant_id = %ctx.tenant_id,
                    device_id = %outcome.device_id,
                    lockout_until_ms = until,
                    "device_locked_out"
                );
            }
            true
        }
        Err(err) => {
            warn!(
                target: "fleet.worker",
                tenant_id = %ctx.tenant_id,
                serial_number = %envelope.report.serial_number,
                error = %err,
                "ping_failed"
            );
            false
        }
    }
}
