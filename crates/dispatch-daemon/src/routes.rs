//! Axum router and all HTTP handlers for dispatch-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! CORS/tracing layers afterward so `dispatch-testkit`'s scenario tests can
//! exercise the bare router. Every handler is generic over
//! `S: dispatch_db::PickupStore` so the same code runs against the
//! production Postgres store and the in-memory test fake.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{body::Bytes, Json, Router};
use dispatch_db::{NewPickup, PickupStore};
use dispatch_schemas::{VendorCallbackBody, VendorLocationUpdate};
use tracing::info;
use uuid::Uuid;

use crate::api_types::{NewPickupRequest, PickupDetailResponse};
use crate::error::{from_store_error, ApiError};
use crate::hmac_auth;
use crate::state::{AppState, SharedState};
use crate::{customer_auth, eta};

pub fn build_router<S: PickupStore + 'static>(state: SharedState<S>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/pickups", post(create_pickup::<S>))
        .route("/api/pickups/:id", get(get_pickup::<S>))
        .route("/api/pickups/:id/cancel", post(cancel_pickup::<S>))
        .route("/api/pickups/:id/find-vendor", post(find_vendor::<S>))
        .route("/api/vendor/accept", post(vendor_accept::<S>))
        .route("/api/vendor/reject", post(vendor_reject::<S>))
        .route("/api/vendor/on-the-way", post(vendor_on_the_way::<S>))
        .route("/api/vendor/pickup-done", post(vendor_pickup_done::<S>))
        .route("/api/vendor/location", post(vendor_location::<S>))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// POST /api/pickups
// ---------------------------------------------------------------------------

async fn create_pickup<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    Json(body): Json<NewPickupRequest>,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let customer_id = customer_auth::extract_customer_id(&headers)?;

    if body.items.is_empty() {
        return Err(ApiError::InvalidInput("pickup must have at least one item".to_string()));
    }

    let id = Uuid::new_v4();
    let new = NewPickup {
        id,
        customer_id,
        address: body.address,
        latitude: body.latitude,
        longitude: body.longitude,
        time_slot: body.time_slot,
        items: body
            .items
            .into_iter()
            .map(|i| {
                (
                    i.scrap_type_id.unwrap_or_else(Uuid::new_v4),
                    i.scrap_type_name,
                    i.estimated_quantity,
                )
            })
            .collect(),
    };

    let pickup = state
        .engine
        .create_pickup(&new)
        .await
        .map_err(|e| from_store_error(e, "pickup could not be created"))?;

    let engine = state.engine.clone();
    let pickup_id = pickup.id;
    tokio::spawn(async move {
        if let Err(e) = engine.dispatch(pickup_id, &[]).await {
            tracing::error!(%pickup_id, error = %e, "background dispatch failed");
        }
    });

    info!(pickup_id = %pickup.id, "pickup created, dispatch triggered");
    Ok(Json(pickup))
}

// ---------------------------------------------------------------------------
// GET /api/pickups/:id
// ---------------------------------------------------------------------------

async fn get_pickup<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PickupDetailResponse>, ApiError> {
    let customer_id = customer_auth::extract_customer_id(&headers)?;

    let pickup = state
        .engine
        .fetch_pickup(id)
        .await
        .map_err(|e| from_store_error(e, "lookup failed"))?
        .ok_or(ApiError::NotFound)?;

    // Row-level authorization: hide pickups that aren't this customer's.
    if pickup.customer_id != customer_id {
        return Err(ApiError::NotFound);
    }

    let items = state
        .engine
        .list_items(id)
        .await
        .map_err(|e| from_store_error(e, "lookup failed"))?;

    let vendor = match &pickup.assigned_vendor_ref {
        Some(vendor_ref) => state
            .engine
            .fetch_vendor(vendor_ref)
            .await
            .map_err(|e| from_store_error(e, "lookup failed"))?,
        None => None,
    };

    let eta_minutes = vendor
        .as_ref()
        .and_then(|v| eta::eta_minutes(pickup.latitude, pickup.longitude, v.latitude, v.longitude));

    Ok(Json(PickupDetailResponse {
        pickup,
        items,
        vendor,
        eta_minutes,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/pickups/:id/cancel
// ---------------------------------------------------------------------------

async fn cancel_pickup<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let customer_id = customer_auth::extract_customer_id(&headers)?;

    let pickup = state
        .engine
        .cancel(id, customer_id)
        .await
        .map_err(|e| from_store_error(e, "pickup already completed, or not found"))?;

    Ok(Json(pickup))
}

// ---------------------------------------------------------------------------
// POST /api/pickups/:id/find-vendor
// ---------------------------------------------------------------------------

async fn find_vendor<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let customer_id = customer_auth::extract_customer_id(&headers)?;

    let existing = state
        .engine
        .fetch_pickup(id)
        .await
        .map_err(|e| from_store_error(e, "lookup failed"))?
        .ok_or(ApiError::NotFound)?;
    if existing.customer_id != customer_id {
        return Err(ApiError::NotFound);
    }
    if existing.status.is_dispatch_final() {
        return Err(ApiError::LostRace(
            "pickup is assigned, on the way, cancelled, or completed".to_string(),
        ));
    }

    let pickup = state
        .engine
        .dispatch(id, &[])
        .await
        .map_err(|e| from_store_error(e, "find-vendor failed"))?;

    Ok(Json(pickup))
}

// ---------------------------------------------------------------------------
// Vendor callbacks: all HMAC-verified over the raw body.
// ---------------------------------------------------------------------------

fn parse_callback_body(
    headers: &HeaderMap,
    body: &Bytes,
    secret: &str,
) -> Result<VendorCallbackBody, ApiError> {
    hmac_auth::verify(headers, body, secret)?;
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidInput(format!("malformed callback body: {e}")))
}

async fn vendor_accept<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let callback = parse_callback_body(&headers, &body, &state.vendor_webhook_secret)?;
    let pickup = state
        .engine
        .on_accept(callback.pickup_id, &callback.vendor_ref)
        .await
        .map_err(|e| from_store_error(e, "offer already resolved, expired, or wrong vendor"))?;
    Ok(Json(pickup))
}

async fn vendor_reject<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let callback = parse_callback_body(&headers, &body, &state.vendor_webhook_secret)?;
    let pickup = state
        .engine
        .on_reject(callback.pickup_id, &callback.vendor_ref)
        .await
        .map_err(|e| from_store_error(e, "offer already resolved or expired (late reject)"))?;
    Ok(Json(pickup))
}

async fn vendor_on_the_way<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let callback = parse_callback_body(&headers, &body, &state.vendor_webhook_secret)?;
    let pickup = state
        .engine
        .on_vendor_on_the_way(callback.pickup_id, &callback.vendor_ref)
        .await
        .map_err(|e| from_store_error(e, "pickup is not assigned to this vendor"))?;
    Ok(Json(pickup))
}

async fn vendor_pickup_done<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<dispatch_schemas::Pickup>, ApiError> {
    let callback = parse_callback_body(&headers, &body, &state.vendor_webhook_secret)?;
    let pickup = state
        .engine
        .on_vendor_complete(callback.pickup_id, &callback.vendor_ref)
        .await
        .map_err(|e| from_store_error(e, "pickup is not assigned or on the way for this vendor"))?;
    Ok(Json(pickup))
}

// ---------------------------------------------------------------------------
// POST /api/vendor/location
// ---------------------------------------------------------------------------

async fn vendor_location<S: PickupStore + 'static>(
    State(state): State<SharedState<S>>,
    Json(body): Json<VendorLocationUpdate>,
) -> Result<Json<dispatch_schemas::VendorBackend>, ApiError> {
    if let Some(url) = &body.offer_url {
        dispatch_transport::validate_url(url, state.deploy_env)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    }

    let vendor = state
        .engine
        .upsert_vendor(
            &body.vendor_ref,
            body.offer_url.as_deref(),
            body.latitude,
            body.longitude,
        )
        .await
        .map_err(|e| from_store_error(e, "vendor upsert failed"))?;

    Ok(Json(vendor))
}
