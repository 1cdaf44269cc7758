//! Round-trip / idempotence properties exercised directly
//! against the engine, independent of the six named concrete scenarios.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use dispatch_config::DeployEnv;
use dispatch_db::{LostRace, NewPickup, PickupStore};
use dispatch_engine::DispatchEngine;
use dispatch_schemas::PickupStatus;
use dispatch_testkit::{InMemoryStore, VendorStub};
use dispatch_transport::OfferTransport;
use uuid::Uuid;

async fn new_engine_and_pickup(
    vendor_url: &str,
) -> anyhow::Result<(Arc<InMemoryStore>, DispatchEngine<InMemoryStore>, dispatch_schemas::Pickup)> {
    let store = Arc::new(InMemoryStore::new());
    store.seed_vendor("V1", vendor_url, Some(12.97), Some(77.59));

    let transport = OfferTransport::new(None, DeployEnv::Development);
    let engine = DispatchEngine::new(Arc::clone(&store), transport)
        .with_offer_timeout(Duration::from_secs(120));

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

    Ok((store, engine, pickup))
}

#[tokio::test]
async fn begin_finding_is_idempotent_over_requestable_statuses() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (store, _engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;

    // REQUESTED -> FINDING_VENDOR
    let a = store.begin_finding(pickup.id).await?;
    assert_eq!(a.status, PickupStatus::FindingVendor);

    // FINDING_VENDOR -> FINDING_VENDOR (idempotent, clears any offer fields)
    let b = store.begin_finding(pickup.id).await?;
    assert_eq!(b.status, PickupStatus::FindingVendor);
    assert!(b.assigned_vendor_ref.is_none());

    let given_up = store.give_up(pickup.id).await?;
    assert_eq!(given_up.status, PickupStatus::NoVendorAvailable);

    // NO_VENDOR_AVAILABLE -> FINDING_VENDOR
    let c = store.begin_finding(pickup.id).await?;
    assert_eq!(c.status, PickupStatus::FindingVendor);

    Ok(())
}

#[tokio::test]
async fn dispatch_is_a_no_op_while_a_valid_offer_exists() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (_store, engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;

    let first = engine.dispatch(pickup.id, &[]).await?;
    assert_eq!(first.assigned_vendor_ref.as_deref(), Some("V1"));

    // A valid, unexpired offer is already outstanding, so the second call
    // is a true no-op: no re-ranking, no new reservation, no second offer.
    let second = engine.dispatch(pickup.id, &[]).await?;
    assert_eq!(second.assigned_vendor_ref.as_deref(), Some("V1"));
    assert_eq!(second.assignment_expires_at, first.assignment_expires_at);
    assert_eq!(vendor.offers_received(), 1, "dispatch must not re-send while a valid offer exists");

    Ok(())
}

#[tokio::test]
async fn confirm_assignment_succeeds_at_most_once() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (_store, engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;

    engine.dispatch(pickup.id, &[]).await?;
    let accepted = engine.on_accept(pickup.id, "V1").await?;
    assert_eq!(accepted.status, PickupStatus::Assigned);

    let second_accept = engine.on_accept(pickup.id, "V1").await;
    let err = second_accept.expect_err("a second accept on an already-assigned pickup must fail");
    assert!(err.downcast_ref::<LostRace>().is_some());

    Ok(())
}

#[tokio::test]
async fn cancel_followed_by_cancel_leaves_state_unchanged() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (store, engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;
    let customer_id = pickup.customer_id;

    engine.dispatch(pickup.id, &[]).await?;
    let first = engine.cancel(pickup.id, customer_id).await?;
    assert_eq!(first.status, PickupStatus::Cancelled);

    let err = engine
        .cancel(pickup.id, customer_id)
        .await
        .expect_err("cancelling twice must fail on the second call");
    assert!(err.downcast_ref::<LostRace>().is_some());

    let row = store.peek(pickup.id).unwrap();
    assert_eq!(row.status, PickupStatus::Cancelled);
    assert_eq!(row.cancelled_at, first.cancelled_at, "state must be unchanged after the failed retry");

    Ok(())
}

#[tokio::test]
async fn complete_succeeds_directly_from_assigned() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (store, engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;

    engine.dispatch(pickup.id, &[]).await?;
    let accepted = engine.on_accept(pickup.id, "V1").await?;
    assert_eq!(accepted.status, PickupStatus::Assigned);

    // The vendor never posts `on-the-way`; `pickup-done` must still succeed.
    let completed = store.complete(pickup.id, "V1").await?;
    assert_eq!(completed.status, PickupStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn set_on_the_way_is_idempotent_on_already_on_the_way() -> anyhow::Result<()> {
    let vendor = VendorStub::spawn(StatusCode::OK).await;
    let (store, engine, pickup) = new_engine_and_pickup(&vendor.base_url).await?;

    engine.dispatch(pickup.id, &[]).await?;
    engine.on_accept(pickup.id, "V1").await?;

    let first = store.set_on_the_way(pickup.id, "V1").await?;
    assert_eq!(first.status, PickupStatus::OnTheWay);

    // A duplicate `on-the-way` callback on an already-ON_THE_WAY pickup
    // must succeed rather than lose the race.
    let second = store.set_on_the_way(pickup.id, "V1").await?;
    assert_eq!(second.status, PickupStatus::OnTheWay);

    Ok(())
}
