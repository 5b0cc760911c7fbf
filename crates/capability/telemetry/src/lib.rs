//! 追踪、请求 ID、运维告警与计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 运维告警级别。
///
/// - Warning：单台设备的心跳合并失败
/// - System：查询或全量扫描失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Warning,
    System,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Warning => "warning",
            AlertKind::System => "system",
        }
    }
}

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub pings_received: u64,
    pub pings_merged: u64,
    pub merge_failures: u64,
    pub devices_created: u64,
    pub harvest_requested: u64,
    pub lockouts_set: u64,
    pub queries_served: u64,
    pub query_failures: u64,
    pub pages_fetched: u64,
    pub scans_aborted: u64,
    pub warning_alerts: u64,
    pub system_alerts: u64,
}

/// 进程级计数指标。
pub struct TelemetryMetrics {
    pings_received: AtomicU64,
    pings_merged: AtomicU64,
    merge_failures: AtomicU64,
    devices_created: AtomicU64,
    harvest_requested: AtomicU64,
    lockouts_set: AtomicU64,
    queries_served: AtomicU64,
    query_failures: AtomicU64,
    pages_fetched: AtomicU64,
    scans_aborted: AtomicU64,
    warning_alerts: AtomicU64,
    system_alerts: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            pings_received: AtomicU64::new(0),
            pings_merged: AtomicU64::new(0),
            merge_failures: AtomicU64::new(0),
            devices_created: AtomicU64::new(0),
            harvest_requested: AtomicU64::new(0),
            lockouts_set: AtomicU64::new(0),
            queries_served: AtomicU64::new(0),
            query_failures: AtomicU64::new(0),
            pages_fetched: AtomicU64::new(0),
            scans_aborted: AtomicU64::new(0),
            warning_alerts: AtomicU64::new(0),
            system_alerts: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pings_received: self.pings_received.load(Ordering::Relaxed),
            pings_merged: self.pings_merged.load(Ordering::Relaxed),
            merge_failures: self.merge_failures.load(Ordering::Relaxed),
            devices_created: self.devices_created.load(Ordering::Relaxed),
            harvest_requested: self.harvest_requested.load(Ordering::Relaxed),
            lockouts_set: self.lockouts_set.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            query_failures: self.query_failures.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            scans_aborted: self.scans_aborted.load(Ordering::Relaxed),
            warning_alerts: self.warning_alerts.load(Ordering::Relaxed),
            system_alerts: self.system_alerts.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 发出运维告警并计数。
pub fn raise_alert(kind: AlertKind, detail: &str) {
    match kind {
        AlertKind::Warning => {
            metrics().warning_alerts.fetch_add(1, Ordering::Relaxed);
            warn!(target: "fleet.alert", kind = kind.as_str(), detail, "operational_alert");
        }
        AlertKind::System => {
            metrics().system_alerts.fetch_add(1, Ordering::Relaxed);
            error!(target: "fleet.alert", kind = kind.as_str(), detail, "operational_alert");
        }
    }
}

/// 记录收到的心跳数。
pub fn record_ping_received() {
    metrics().pings_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录合并成功的心跳数。
pub fn record_ping_merged() {
    metrics().pings_merged.fetch_add(1, Ordering::Relaxed);
}

/// 记录合并失败次数。
pub fn record_merge_failure() {
    metrics().merge_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录因首次心跳新建的设备数。
pub fn record_device_created() {
    metrics().devices_created.fetch_add(1, Ordering::Relaxed);
}

/// 记录 harvest 请求次数。
pub fn record_harvest_requested() {
    metrics().harvest_requested.fetch_add(1, Ordering::Relaxed);
}

/// 记录设置节流截止时间的次数。
pub fn record_lockout_set() {
    metrics().lockouts_set.fetch_add(1, Ordering::Relaxed);
}

/// 记录完成的分页查询数。
pub fn record_query_served() {
    metrics().queries_served.fetch_add(1, Ordering::Relaxed);
}

/// 记录查询失败次数。
pub fn record_query_failure() {
    metrics().query_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录全量扫描取回的页数。
pub fn record_page_fetched() {
    metrics().pages_fetched.fetch_add(1, Ordering::Relaxed);
}

/// 记录被中止（钩子 Break 或页数上限）的全量扫描。
pub fn record_scan_aborted() {
    metrics().scans_aborted.fetch_add(1, Ordering::Relaxed);
}
