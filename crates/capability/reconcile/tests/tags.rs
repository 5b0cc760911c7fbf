use domain::TenantContext;
use fleet_lookup::InMemoryConfigCatalog;
use fleet_query::{DeviceQuery, DeviceScanner, PredicateCompiler, ScanConfig};
use fleet_reconcile::{DeviceSelector, DeviceTagService, InMemoryTagCounter, ReconcileError};
use fleet_storage::{DeviceRecord, DeviceStore, InMemoryDeviceStore};
use std::sync::Arc;

fn ctx() -> TenantContext {
    TenantContext::new("tenant-1", "operator-7")
}

struct Fixture {
    store: Arc<InMemoryDeviceStore>,
    counter: Arc<InMemoryTagCounter>,
    service: DeviceTagService,
}

fn fixture(records: Vec<DeviceRecord>) -> Fixture {
    let store = Arc::new(InMemoryDeviceStore::with_records(records));
    let compiler = PredicateCompiler::new(Arc::new(InMemoryConfigCatalog::new()));
    let scanner = Arc::new(DeviceScanner::new(
        store.clone(),
        compiler,
        ScanConfig::new(20, 2),
    ));
    let counter = Arc::new(InMemoryTagCounter::new());
    let service = DeviceTagService::new(store.clone(), scanner, counter.clone());
    Fixture {
        store,
        counter,
        service,
    }
}

fn device(idx: usize, tags: &[&str]) -> DeviceRecord {
    DeviceRecord {
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        ..DeviceRecord::new(format!("d-{idx}"), "tenant-1", format!("SN-{idx:03}"))
    }
}

async fn tags_of(store: &InMemoryDeviceStore, id: &str) -> Vec<String> {
    store
        .load_by_id(&ctx(), id)
        .await
        .expect("load")
        .expect("record exists")
        .tags
}

#[tokio::test]
async fn add_tags_normalises_and_skips_duplicates() {
    let fx = fixture(vec![device(1, &["red"])]);
    let update = fx
        .service
        .add_tags(
            &ctx(),
            &DeviceSelector::Id("d-1".to_string()),
            &["Red".to_string(), " Blue ".to_string()],
        )
        .await
        .expect("add");
    assert_eq!(update.devices_changed, 1);
    assert_eq!(update.counts.get("blue"), Some(&1));
    assert_eq!(update.counts.get("red"), None);
    assert_eq!(tags_of(&fx.store, "d-1").await, vec!["red", "blue"]);
    assert_eq!(fx.counter.count("tenant-1", "blue"), 1);
}

#[tokio::test]
async fn unchanged_devices_are_not_counted() {
    let fx = fixture(vec![device(1, &["red"]), device(2, &[])]);
    let update = fx
        .service
        .add_tags(
            &ctx(),
            &DeviceSelector::Ids(vec!["d-1".to_string(), "d-2".to_string(), "missing".to_string()]),
            &["red".to_string()],
        )
        .await
        .expect("add");
    assert_eq!(update.devices_changed, 1);
    assert_eq!(fx.counter.count("tenant-1", "red"), 1);
}

#[tokio::test]
async fn remove_tags_by_serial() {
    let fx = fixture(vec![device(1, &["red", "blue"])]);
    let update = fx
        .service
        .remove_tags(
            &ctx(),
            &DeviceSelector::Serial("SN-001".to_string()),
            &["Blue".to_string()],
        )
        .await
        .expect("remove");
    assert_eq!(update.devices_changed, 1);
    assert_eq!(update.counts.get("blue"), Some(&-1));
    assert_eq!(tags_of(&fx.store, "d-1").await, vec!["red"]);
}

#[tokio::test]
async fn replace_tag_across_query_matches() {
    let records = (0..5)
        .map(|idx| device(idx, if idx % 2 == 0 { &["old"] } else { &["keep"] }))
        .collect();
    let fx = fixture(records);
    let update = fx
        .service
        .replace_tag(&ctx(), &DeviceSelector::Query(DeviceQuery::all()), "old", "new")
        .await
        .expect("replace");
    assert_eq!(update.devices_changed, 3);
    assert_eq!(update.counts.get("old"), Some(&-3));
    assert_eq!(update.counts.get("new"), Some(&3));
    assert_eq!(tags_of(&fx.store, "d-0").await, vec!["new"]);
    assert_eq!(tags_of(&fx.store, "d-1").await, vec!["keep"]);
}

#[tokio::test]
async fn blank_tenant_is_rejected() {
    let fx = fixture(vec![device(1, &[])]);
    let err = fx
        .service
        .add_tags(
            &TenantContext::default(),
            &DeviceSelector::Id("d-1".to_string()),
            &["red".to_string()],
        )
        .await
        .expect_err("blank tenant");
    assert!(matches!(err, ReconcileError::Contract(_)));
}
