//! A pickup is left in FINDING_VENDOR with an
//! expired offer because the process holding its timer crashed before the
//! timer ever fired. A fresh engine instance over the same store — standing
//! in for the restarted process — must reclaim it via the sweeper rather
//! than leaving it stuck forever.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use dispatch_config::DeployEnv;
use dispatch_db::{NewPickup, PickupStore};
use dispatch_engine::DispatchEngine;
use dispatch_schemas::PickupStatus;
use dispatch_testkit::{InMemoryStore, VendorStub};
use dispatch_transport::OfferTransport;
use uuid::Uuid;

#[tokio::test]
async fn sweeper_reclaims_offer_whose_timer_never_fired() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    store.seed_vendor("V1", &vendor.base_url, Some(12.90), Some(77.50));
    store.seed_vendor("V2", &vendor.base_url, Some(12.97), Some(77.59));

    let transport = OfferTransport::new(None, DeployEnv::Development);

    // "Process 1" creates the pickup and reserves an offer to V1, then
    // crashes before it ever spawns the in-process timer — simulated here
    // by calling the store primitives directly instead of `dispatch()`.
    let pickup_id = Uuid::new_v4();
    store
        .create_pickup(&NewPickup {
            id: pickup_id,
            customer_id: Uuid::new_v4(),
            address: "12 Residency Road".to_string(),
            latitude: Some(12.9716),
            longitude: Some(77.5946),
            time_slot: "MORNING".to_string(),
            items: vec![],
        })
        .await?;
    store.begin_finding(pickup_id).await?;
    let expires_at = Utc::now() - chrono::Duration::seconds(5);
    store.reserve_offer(pickup_id, "V1", expires_at).await?;

    // "Process 2" boots with a brand new, empty in-memory timer/exclusion
    // registry over the same store.
    let engine2 = DispatchEngine::new(Arc::clone(&store), transport)
        .with_offer_timeout(Duration::from_secs(120));

    let advanced = engine2.sweep_expired().await?;
    assert_eq!(advanced, 1);

    let row = store.peek(pickup_id).unwrap();
    assert_eq!(row.status, PickupStatus::FindingVendor);
    assert_eq!(
        row.assigned_vendor_ref.as_deref(),
        Some("V2"),
        "sweeper should have excluded V1 and offered the next candidate"
    );
    assert_eq!(vendor.offers_received(), 1, "only the recovered offer to V2 went out");

    Ok(())
}
