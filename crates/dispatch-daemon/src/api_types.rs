//! Request/response DTOs for the customer-facing HTTP surface.
//! Vendor callback bodies live in `dispatch_schemas` (`VendorCallbackBody`,
//! `VendorLocationUpdate`) since they're shared with the field-alias
//! tolerance tests there.

use dispatch_schemas::{Pickup, PickupItem, VendorBackend};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /api/pickups` request body.
#[derive(Debug, Deserialize)]
pub struct NewPickupRequest {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_slot: String,
    pub items: Vec<NewPickupItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct NewPickupItemRequest {
    pub scrap_type_id: Option<Uuid>,
    pub scrap_type_name: String,
    pub estimated_quantity: f64,
}

/// `GET /api/pickups/:id` response: the pickup, its items, the assigned
/// vendor's current location (if any), and a derived ETA.
#[derive(Debug, Serialize)]
pub struct PickupDetailResponse {
    #[serde(flatten)]
    pub pickup: Pickup,
    pub items: Vec<PickupItem>,
    pub vendor: Option<VendorBackend>,
    pub eta_minutes: Option<i64>,
}
