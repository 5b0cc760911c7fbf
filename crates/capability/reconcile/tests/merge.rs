use domain::{CommunicationMethod, GeoLocation, PingReport, TenantContext};
use fleet_lookup::{
    ConfigFileMeta, ConfigLookup, FirmwareMeta, InMemoryConfigCatalog, InMemoryFirmwareCatalog,
    LookupError,
};
use fleet_reconcile::{
    FixedClock, LOCKOUT_DURATION_MS, PingMerger, RECENT_PING_WINDOW_MS, ReconcileError,
};
use fleet_storage::DeviceRecord;
use fleet_telemetry::metrics;
use std::sync::Arc;

const HOUR_MS: i64 = 60 * 60 * 1000;
const T0: i64 = 1_700_000_000_000;

fn ctx() -> TenantContext {
    TenantContext::system("tenant-1")
}

struct Fixture {
    configs: Arc<InMemoryConfigCatalog>,
    firmware: Arc<InMemoryFirmwareCatalog>,
    clock: Arc<FixedClock>,
    merger: PingMerger,
}

fn fixture() -> Fixture {
    let configs = Arc::new(InMemoryConfigCatalog::new());
    let firmware = Arc::new(InMemoryFirmwareCatalog::new());
    let clock = Arc::new(FixedClock::new(T0));
    let merger = PingMerger::new(configs.clone(), firmware.clone(), clock.clone());
    Fixture {
        configs,
        firmware,
        clock,
        merger,
    }
}

fn report(ping_time_ms: i64) -> PingReport {
    PingReport {
        serial_number: "SN-001".to_string(),
        ping_time_ms,
        location: Some(GeoLocation {
            latitude: 51.5,
            longitude: -0.12,
        }),
        rssi: 17,
        battery_voltage: 4100,
        vin: Some("1HGCM82633A004352".to_string()),
        iccid: Some("8944500000000000001".to_string()),
        operator: Some("Vodafone".to_string()),
        ble_version: 7,
        supervisor_version: 3,
        ..PingReport::default()
    }
}

fn record() -> DeviceRecord {
    DeviceRecord::new("dev-1", "tenant-1", "SN-001")
}

#[tokio::test]
async fn merging_same_report_twice_only_moves_counters() {
    let fx = fixture();
    let ping = report(T0);
    let first = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("first merge");
    let second = fx
        .merger
        .merge_ping(&ctx(), first.record.clone(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("second merge");

    let mut a = first.record.clone();
    let mut b = second.record.clone();
    assert_eq!(a.ping_count, 1);
    assert_eq!(b.ping_count, 2);
    assert!(b.recent_pings_count > a.recent_pings_count);
    a.ping_count = 0;
    b.ping_count = 0;
    a.recent_pings_count = 0;
    b.recent_pings_count = 0;
    assert_eq!(a, b);
}

#[tokio::test]
async fn blank_strings_keep_stored_values() {
    let fx = fixture();
    let first = fx
        .merger
        .merge_ping(&ctx(), record(), &report(T0), CommunicationMethod::Cellular)
        .await
        .expect("merge");

    let sparse = PingReport {
        vin: Some("   ".to_string()),
        iccid: None,
        operator: Some(String::new()),
        rssi: 3,
        location: None,
        ..report(T0 + HOUR_MS)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), first.record, &sparse, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;

    assert_eq!(merged.vin.as_deref(), Some("1HGCM82633A004352"));
    assert_eq!(merged.iccid.as_deref(), Some("8944500000000000001"));
    assert_eq!(merged.operator.as_deref(), Some("Vodafone"));
    // 数值与位置每次覆盖
    assert_eq!(merged.rssi, 3);
    assert_eq!(merged.last_known_location, None);

    let filled = PingReport {
        vin: Some("WVWZZZ1JZXW000001".to_string()),
        ..report(T0 + 2 * HOUR_MS)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), merged, &filled, CommunicationMethod::Sms)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.vin.as_deref(), Some("WVWZZZ1JZXW000001"));
    assert_eq!(merged.communication_method, CommunicationMethod::Sms);
}

#[tokio::test]
async fn harvest_requested_only_for_unknown_standard_hash() {
    let fx = fixture();
    let ping = PingReport {
        standard_hash: Some("H1".to_string()),
        ..report(T0)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(outcome.requires_harvest);
    assert_eq!(
        outcome.record.last_reported_standard_configuration_hash.as_deref(),
        Some("H1")
    );
    assert_eq!(outcome.record.standard_configuration_title, None);

    fx.configs.register(
        "tenant-1",
        ConfigFileMeta {
            id: "cfg-1".to_string(),
            title: "Fleet Standard".to_string(),
            hash: "H1".to_string(),
        },
    );
    let outcome = fx
        .merger
        .merge_ping(&ctx(), outcome.record, &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);
    assert_eq!(
        outcome.record.standard_configuration_title.as_deref(),
        Some("Fleet Standard")
    );
    assert_eq!(
        outcome.record.last_reported_standard_configuration.as_deref(),
        Some("cfg-1")
    );

    // 哈希未变且标题已解析：不再询问
    let outcome = fx
        .merger
        .merge_ping(&ctx(), outcome.record, &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);

    // 未带哈希的心跳从不要求 harvest
    let outcome = fx
        .merger
        .merge_ping(&ctx(), record(), &report(T0), CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);
}

#[tokio::test]
async fn standard_hash_is_tenant_scoped() {
    let fx = fixture();
    fx.configs.register(
        "tenant-2",
        ConfigFileMeta {
            id: "cfg-9".to_string(),
            title: "Other".to_string(),
            hash: "H1".to_string(),
        },
    );
    let ping = PingReport {
        standard_hash: Some("H1".to_string()),
        ..report(T0)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(outcome.requires_harvest);
}

#[tokio::test]
async fn delta_hash_zero_clears_resolution() {
    let fx = fixture();
    fx.configs.register(
        "tenant-1",
        ConfigFileMeta {
            id: "delta-1".to_string(),
            title: "Cold Weather".to_string(),
            hash: "D1".to_string(),
        },
    );
    let ping = PingReport {
        delta_hash: Some("D1".to_string()),
        ..report(T0)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.delta_configuration_title.as_deref(), Some("Cold Weather"));
    assert_eq!(merged.last_reported_delta_configuration.as_deref(), Some("delta-1"));

    let cleared = PingReport {
        delta_hash: Some("0".to_string()),
        ..report(T0 + HOUR_MS)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), merged, &cleared, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);
    assert_eq!(
        outcome.record.last_reported_delta_configuration_hash.as_deref(),
        Some("0")
    );
    assert_eq!(outcome.record.delta_configuration_title, None);
    assert_eq!(outcome.record.last_reported_delta_configuration, None);

    // 未登记的差量哈希：更新哈希，标题保持未解析
    let unknown = PingReport {
        delta_hash: Some("D2".to_string()),
        ..report(T0 + 2 * HOUR_MS)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), outcome.record, &unknown, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);
    assert_eq!(
        outcome.record.last_reported_delta_configuration_hash.as_deref(),
        Some("D2")
    );
    assert_eq!(outcome.record.delta_configuration_title, None);
}

#[tokio::test]
async fn firmware_versions_resolve_on_change() {
    let fx = fixture();
    fx.firmware.register(FirmwareMeta {
        id: "fw-ble-7".to_string(),
        title: "BLE 7".to_string(),
        version: "7".to_string(),
    });
    fx.firmware.register(FirmwareMeta {
        id: "fw-app-2".to_string(),
        title: "App 2.1".to_string(),
        version: "2.1".to_string(),
    });
    let ping = PingReport {
        application_version: Some("2.1".to_string()),
        ..report(T0)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;

    assert_eq!(merged.bluetooth_firmware_version.as_deref(), Some("7"));
    assert_eq!(merged.last_reported_bluetooth_firmware.as_deref(), Some("fw-ble-7"));
    assert_eq!(merged.bluetooth_firmware_version_title.as_deref(), Some("BLE 7"));
    // 未登记的 supervisor 版本：只更新版本字符串
    assert_eq!(merged.supervisor_firmware_version.as_deref(), Some("3"));
    assert_eq!(merged.last_reported_supervisor_firmware, None);
    assert_eq!(merged.application_firmware_version.as_deref(), Some("2.1"));
    assert_eq!(merged.last_reported_application_firmware.as_deref(), Some("fw-app-2"));

    // 空白应用版本不覆盖
    let blank = PingReport {
        application_version: Some(" ".to_string()),
        ..report(T0 + HOUR_MS)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), merged, &blank, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.application_firmware_version.as_deref(), Some("2.1"));
}

#[tokio::test]
async fn capabilities_replaced_only_when_supplied() {
    let fx = fixture();
    let ping = PingReport {
        capabilities: vec!["GPS".to_string(), "CAN".to_string()],
        ..report(T0)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.capabilities, vec!["GPS", "CAN"]);

    let merged = fx
        .merger
        .merge_ping(&ctx(), merged, &report(T0 + HOUR_MS), CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.capabilities, vec!["GPS", "CAN"]);

    let ping = PingReport {
        capabilities: vec!["BLE".to_string()],
        ..report(T0 + 2 * HOUR_MS)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), merged, &ping, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.capabilities, vec!["BLE"]);
}

#[tokio::test]
async fn fourth_recent_ping_sets_lockout_and_stale_ping_resets() {
    let fx = fixture();
    let mut current = DeviceRecord {
        last_contact_ms: Some(T0),
        ..record()
    };

    for step in 1..=4 {
        let ping_time = T0 + step * HOUR_MS;
        fx.clock.set(ping_time);
        let outcome = fx
            .merger
            .merge_ping(&ctx(), current, &report(ping_time), CommunicationMethod::Cellular)
            .await
            .expect("merge");
        assert_eq!(outcome.record.recent_pings_count, step as i32);
        assert_eq!(outcome.lockout_set, step == 4);
        current = outcome.record;
    }
    let lockout = current.lockout_until_ms.expect("lockout set");
    assert_eq!(lockout, T0 + 4 * HOUR_MS + LOCKOUT_DURATION_MS);

    let late = T0 + 4 * HOUR_MS + RECENT_PING_WINDOW_MS + HOUR_MS;
    fx.clock.set(late);
    let outcome = fx
        .merger
        .merge_ping(&ctx(), current, &report(late), CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert_eq!(outcome.record.recent_pings_count, 0);
    assert!(!outcome.lockout_set);
    assert_eq!(outcome.record.lockout_until_ms, Some(lockout));
    assert_eq!(outcome.record.last_contact_ms, Some(late));
    assert_eq!(outcome.record.ping_count, 5);
}

#[tokio::test]
async fn first_contact_starts_recent_count_at_zero() {
    let fx = fixture();
    let outcome = fx
        .merger
        .merge_ping(&ctx(), record(), &report(T0), CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert_eq!(outcome.record.recent_pings_count, 0);
    assert_eq!(outcome.record.ping_count, 1);
    assert_eq!(outcome.record.last_contact_ms, Some(T0));
}

#[tokio::test]
async fn blank_tenant_or_serial_is_contract_violation() {
    let fx = fixture();
    let err = fx
        .merger
        .merge_ping(
            &TenantContext::default(),
            record(),
            &report(T0),
            CommunicationMethod::Cellular,
        )
        .await
        .expect_err("blank tenant");
    assert!(matches!(err, ReconcileError::Contract(_)));

    let ping = PingReport {
        serial_number: "  ".to_string(),
        ..report(T0)
    };
    let err = fx
        .merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect_err("blank serial");
    assert!(matches!(err, ReconcileError::Contract(_)));
}

struct BrokenConfigLookup;

#[async_trait::async_trait]
impl ConfigLookup for BrokenConfigLookup {
    async fn resolve_by_hash(
        &self,
        _ctx: &TenantContext,
        _hash: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        Err(LookupError::Backend("connection refused".to_string()))
    }

    async fn find_by_title(
        &self,
        _ctx: &TenantContext,
        _title: &str,
    ) -> Result<Option<ConfigFileMeta>, LookupError> {
        Err(LookupError::Backend("connection refused".to_string()))
    }

    async fn find_all_by_title(
        &self,
        _ctx: &TenantContext,
        _title: &str,
    ) -> Result<Vec<ConfigFileMeta>, LookupError> {
        Err(LookupError::Backend("connection refused".to_string()))
    }
}

#[tokio::test]
async fn lookup_failure_is_alerted_and_propagated() {
    let merger = PingMerger::new(
        Arc::new(BrokenConfigLookup),
        Arc::new(InMemoryFirmwareCatalog::new()),
        Arc::new(FixedClock::new(T0)),
    );
    let before = metrics().snapshot();
    let ping = PingReport {
        standard_hash: Some("H1".to_string()),
        ..report(T0)
    };
    let err = merger
        .merge_ping(&ctx(), record(), &ping, CommunicationMethod::Cellular)
        .await
        .expect_err("lookup failure");
    assert!(matches!(err, ReconcileError::Lookup(_)));

    let after = metrics().snapshot();
    assert!(after.merge_failures > before.merge_failures);
    assert!(after.warning_alerts > before.warning_alerts);
}

#[tokio::test]
async fn resolved_title_sticks_when_new_hash_is_harvested_later() {
    // 标题已解析时只有哈希变化才会重新解析；harvest 之后的同一哈希不再触发
    let fx = fixture();
    fx.configs.register(
        "tenant-1",
        ConfigFileMeta {
            id: "c0".to_string(),
            title: "T0".to_string(),
            hash: "H0".to_string(),
        },
    );
    let h0 = PingReport {
        standard_hash: Some("H0".to_string()),
        ..report(T0)
    };
    let merged = fx
        .merger
        .merge_ping(&ctx(), record(), &h0, CommunicationMethod::Cellular)
        .await
        .expect("merge")
        .record;
    assert_eq!(merged.standard_configuration_title.as_deref(), Some("T0"));

    let h1 = PingReport {
        standard_hash: Some("H1".to_string()),
        ..report(T0 + HOUR_MS)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), merged, &h1, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(outcome.requires_harvest);

    fx.configs.register(
        "tenant-1",
        ConfigFileMeta {
            id: "c1".to_string(),
            title: "T1".to_string(),
            hash: "H1".to_string(),
        },
    );
    let h1_again = PingReport {
        standard_hash: Some("H1".to_string()),
        ..report(T0 + 2 * HOUR_MS)
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), outcome.record, &h1_again, CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert!(!outcome.requires_harvest);
    let record = outcome.record;
    assert_eq!(
        record.last_reported_standard_configuration_hash.as_deref(),
        Some("H1")
    );
    assert_eq!(record.standard_configuration_title.as_deref(), Some("T0"));
    assert_eq!(record.last_reported_standard_configuration.as_deref(), Some("c0"));
}

#[tokio::test]
async fn extreme_ping_times_reset_recent_count() {
    let fx = fixture();
    let start = DeviceRecord {
        last_contact_ms: Some(i64::MIN),
        recent_pings_count: 2,
        ..record()
    };
    let outcome = fx
        .merger
        .merge_ping(&ctx(), start, &report(i64::MAX), CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert_eq!(outcome.record.recent_pings_count, 0);
    assert_eq!(outcome.record.last_contact_ms, Some(i64::MAX));

    let outcome = fx
        .merger
        .merge_ping(&ctx(), outcome.record, &report(i64::MIN), CommunicationMethod::Cellular)
        .await
        .expect("merge");
    assert_eq!(outcome.record.recent_pings_count, 0);
}
