//! A vendor accepts after its offer's deadline has
//! passed. The strict `assignment_expires_at > now()` guard must reject it
//! even before the sweeper or the in-process timer has had a chance to
//! clear the stale offer.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use dispatch_config::DeployEnv;
use dispatch_db::{LostRace, NewPickup};
use dispatch_engine::DispatchEngine;
use dispatch_testkit::{InMemoryStore, VendorStub};
use dispatch_transport::OfferTransport;
use uuid::Uuid;

#[tokio::test]
async fn accept_past_deadline_loses_race_before_sweep_runs() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    store.seed_vendor("V1", &vendor.base_url, Some(12.97), Some(77.59));

    let transport = OfferTransport::new(None, DeployEnv::Development);
    let engine = DispatchEngine::new(Arc::clone(&store), transport)
        .with_offer_timeout(Duration::from_millis(150));

    let pickup = engine
        .create_pickup(&NewPickup {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            address: "12 Residency Road".to_string(),
            latitude: Some(12.9716),
            longitude: Some(77.5946),
            time_slot: "MORNING".to_string(),
            items: vec![],
        })
        .await?;

    engine.dispatch(pickup.id, &[]).await?;

    // Past the 150ms deadline but well before the 150ms + 1s grace period
    // the in-process timer waits before firing `on_timeout`.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let row = store.peek(pickup.id).unwrap();
    assert!(
        row.assigned_vendor_ref.is_some(),
        "the timer must not have cleared the offer yet"
    );

    let late_accept = engine.on_accept(pickup.id, "V1").await;
    let err = late_accept.expect_err("accept past the deadline must fail regardless of sweep timing");
    assert!(err.downcast_ref::<LostRace>().is_some());

    Ok(())
}
