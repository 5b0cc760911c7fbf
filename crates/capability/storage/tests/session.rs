use domain::TenantContext;
use fleet_storage::{DeviceBatch, DeviceRecord, DeviceSession, DeviceStore, InMemoryDeviceStore};
use std::sync::Arc;

#[tokio::test]
async fn session_saves_back_to_its_store() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let ctx = TenantContext::system("tenant-1");
    let session = DeviceSession::new(
        store.clone(),
        ctx.clone(),
        DeviceRecord::new("d-1", "tenant-1", "SN-001"),
    );
    session.save().await.expect("save");

    let mut session = DeviceSession::load_by_serial(store.clone(), &ctx, "SN-001")
        .await
        .expect("load")
        .expect("session");
    session.record_mut().ping_count = 3;
    session.save().await.expect("save");

    let stored = store.load_by_id(&ctx, "d-1").await.expect("load").expect("record");
    assert_eq!(stored.ping_count, 3);

    let session = DeviceSession::load(store.clone(), &ctx, "d-1")
        .await
        .expect("load")
        .expect("session");
    assert!(session.delete().await.expect("delete"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn batch_loads_and_saves_all() {
    let store = Arc::new(InMemoryDeviceStore::with_records([
        DeviceRecord::new("d-1", "tenant-1", "SN-001"),
        DeviceRecord::new("d-2", "tenant-1", "SN-002"),
    ]));
    let ctx = TenantContext::system("tenant-1");
    let ids = vec!["d-1".to_string(), "d-2".to_string()];
    let mut batch = DeviceBatch::load_many(store.clone(), &ctx, &ids)
        .await
        .expect("load");
    assert_eq!(batch.len(), 2);
    for record in batch.records_mut() {
        record.tags.push("north".to_string());
    }
    assert_eq!(batch.save_all().await.expect("save"), 2);

    let reloaded = store.load_many(&ctx, &ids).await.expect("load");
    assert!(reloaded.iter().all(|record| record.has_tag("north")));
}

#[tokio::test]
async fn missing_device_yields_no_session() {
    let store = Arc::new(InMemoryDeviceStore::new());
    let ctx = TenantContext::system("tenant-1");
    let session = DeviceSession::load(store, &ctx, "nope").await.expect("load");
    assert!(session.is_none());
}
