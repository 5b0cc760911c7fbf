use domain::{CommunicationMethod, ConfigurationState, PingReport, TenantContext};
use fleet_lookup::{ConfigFileMeta, InMemoryConfigCatalog, InMemoryFirmwareCatalog};
use fleet_reconcile::{FixedClock, PingMerger, ReconcileError, ReconcileService};
use fleet_storage::{DeviceStore, InMemoryDeviceStore};
use std::sync::Arc;

const HOUR_MS: i64 = 60 * 60 * 1000;
const T0: i64 = 1_700_000_000_000;

fn ctx() -> TenantContext {
    TenantContext::system("tenant-1")
}

struct Fixture {
    store: Arc<InMemoryDeviceStore>,
    configs: Arc<InMemoryConfigCatalog>,
    clock: Arc<FixedClock>,
    service: ReconcileService,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryDeviceStore::new());
    let configs = Arc::new(InMemoryConfigCatalog::new());
    let clock = Arc::new(FixedClock::new(T0));
    let merger = PingMerger::new(
        configs.clone(),
        Arc::new(InMemoryFirmwareCatalog::new()),
        clock.clone(),
    );
    let service = ReconcileService::new(store.clone(), merger);
    Fixture {
        store,
        configs,
        clock,
        service,
    }
}

fn ping(serial: &str, ping_time_ms: i64, standard_hash: Option<&str>) -> PingReport {
    PingReport {
        serial_number: serial.to_string(),
        ping_time_ms,
        standard_hash: standard_hash.map(str::to_string),
        rssi: 20,
        ..PingReport::default()
    }
}

#[tokio::test]
async fn unknown_device_is_created_then_resolved_after_harvest() {
    let fx = fixture();
    let first = fx
        .service
        .ingest_ping(&ctx(), &ping("SN-100", T0, Some("H1")), CommunicationMethod::Cellular)
        .await
        .expect("first ping");
    assert!(first.created);
    assert!(first.requires_harvest);

    let stored = fx
        .store
        .load_by_serial(&ctx(), "SN-100")
        .await
        .expect("load")
        .expect("record exists");
    assert_eq!(stored.id, first.device_id);
    assert_eq!(stored.state, ConfigurationState::New);
    assert_eq!(stored.standard_configuration_title, None);
    assert_eq!(stored.ping_count, 1);

    // harvest 完成后再次上报同一哈希
    fx.configs.register(
        "tenant-1",
        ConfigFileMeta {
            id: "cfg-1".to_string(),
            title: "Fleet Standard".to_string(),
            hash: "H1".to_string(),
        },
    );
    let second = fx
        .service
        .ingest_ping(
            &ctx(),
            &ping("SN-100", T0 + HOUR_MS, Some("H1")),
            CommunicationMethod::Cellular,
        )
        .await
        .expect("second ping");
    assert!(!second.created);
    assert!(!second.requires_harvest);
    assert_eq!(second.device_id, first.device_id);

    let stored = fx
        .store
        .load_by_id(&ctx(), &first.device_id)
        .await
        .expect("load")
        .expect("record exists");
    assert_eq!(stored.standard_configuration_title.as_deref(), Some("Fleet Standard"));
    assert_eq!(stored.ping_count, 2);
    assert_eq!(fx.store.len(), 1);
}

#[tokio::test]
async fn lockout_reported_and_observed_on_next_ping() {
    let fx = fixture();
    let mut outcome = None;
    for step in 0..5 {
        let at = T0 + step * HOUR_MS;
        fx.clock.set(at);
        outcome = Some(
            fx.service
                .ingest_ping(&ctx(), &ping("SN-200", at, None), CommunicationMethod::Cellular)
                .await
                .expect("ping"),
        );
    }
    let fifth = outcome.expect("outcome");
    assert_eq!(fifth.lockout_until_ms, Some(T0 + 4 * HOUR_MS + 24 * HOUR_MS));
    assert!(!fifth.locked_out);

    fx.clock.set(T0 + 5 * HOUR_MS);
    let sixth = fx
        .service
        .ingest_ping(
            &ctx(),
            &ping("SN-200", T0 + 5 * HOUR_MS, None),
            CommunicationMethod::Cellular,
        )
        .await
        .expect("ping");
    assert!(sixth.locked_out);
}

#[tokio::test]
async fn devices_are_partitioned_by_tenant() {
    let fx = fixture();
    let other = TenantContext::system("tenant-2");
    let a = fx
        .service
        .ingest_ping(&ctx(), &ping("SN-300", T0, None), CommunicationMethod::Api)
        .await
        .expect("ping");
    let b = fx
        .service
        .ingest_ping(&other, &ping("SN-300", T0, None), CommunicationMethod::Api)
        .await
        .expect("ping");
    assert!(a.created);
    assert!(b.created);
    assert_ne!(a.device_id, b.device_id);
}

#[tokio::test]
async fn contract_violations_leave_store_untouched() {
    let fx = fixture();
    let err = fx
        .service
        .ingest_ping(
            &TenantContext::default(),
            &ping("SN-400", T0, None),
            CommunicationMethod::Cellular,
        )
        .await
        .expect_err("blank tenant");
    assert!(matches!(err, ReconcileError::Contract(_)));

    let err = fx
        .service
        .ingest_ping(&ctx(), &ping("", T0, None), CommunicationMethod::Cellular)
        .await
        .expect_err("blank serial");
    assert!(matches!(err, ReconcileError::Contract(_)));
    assert!(fx.store.is_empty());
}

#[tokio::test]
async fn delete_device_removes_record() {
    let fx = fixture();
    let outcome = fx
        .service
        .ingest_ping(&ctx(), &ping("SN-500", T0, None), CommunicationMethod::Cellular)
        .await
        .expect("ping");
    assert!(
        fx.service
            .delete_device(&ctx(), &outcome.device_id)
            .await
            .expect("delete")
    );
    assert!(
        !fx.service
            .delete_device(&ctx(), &outcome.device_id)
            .await
            .expect("delete again")
    );
    assert!(fx.store.is_empty());
}
