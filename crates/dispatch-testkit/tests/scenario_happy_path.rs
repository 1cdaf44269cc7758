//! The nearest vendor accepts the first offer it
//! receives.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use dispatch_config::DeployEnv;
use dispatch_db::NewPickup;
use dispatch_engine::DispatchEngine;
use dispatch_schemas::PickupStatus;
use dispatch_testkit::{InMemoryStore, VendorStub};
use dispatch_transport::OfferTransport;
use uuid::Uuid;

#[tokio::test]
async fn nearest_vendor_accepts_first_offer() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let vendor = VendorStub::spawn(StatusCode::OK).await;

    // V2 is nearest, V1 and V3 farther away.
    store.seed_vendor("V1", &vendor.base_url, Some(12.90), Some(77.50));
    store.seed_vendor("V2", &vendor.base_url, Some(12.97), Some(77.59));
    store.seed_vendor("V3", &vendor.base_url, Some(13.10), Some(77.70));

    let transport = OfferTransport::new(None, DeployEnv::Development);
    let engine = DispatchEngine::new(Arc::clone(&store), transport)
        .with_offer_timeout(Duration::from_secs(120));

    let customer_id = Uuid::new_v4();
    let pickup = engine
        .create_pickup(&NewPickup {
            id: Uuid::new_v4(),
            customer_id,
            address: "12 Residency Road".to_string(),
            latitude: Some(12.9716),
            longitude: Some(77.5946),
            time_slot: "MORNING".to_string(),
            items: vec![],
        })
        .await?;

    let dispatched = engine.dispatch(pickup.id, &[]).await?;
    assert_eq!(dispatched.status, PickupStatus::FindingVendor);
    assert_eq!(dispatched.assigned_vendor_ref.as_deref(), Some("V2"));

    let accepted = engine.on_accept(pickup.id, "V2").await?;
    assert_eq!(accepted.status, PickupStatus::Assigned);
    assert_eq!(accepted.assigned_vendor_ref.as_deref(), Some("V2"));
    assert!(accepted.assignment_expires_at.is_none());

    assert_eq!(vendor.offers_received(), 1, "only one offer should have gone out");

    Ok(())
}
