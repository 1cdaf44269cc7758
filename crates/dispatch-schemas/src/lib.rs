//! dispatch-schemas
//!
//! Shared data model for the dispatcher: the persisted `Pickup` record and
//! its satellites (`PickupItem`, `VendorBackend`, `PickupVendorRejection`),
//! plus the wire shapes exchanged with vendor backends. Every other crate
//! in the workspace depends on this one; it depends on nothing but serde,
//! chrono and uuid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PickupStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a pickup. Persisted as upper-snake-case text; the
/// same casing is what customer/vendor HTTP responses serialize (§6's
/// "Status enum values" are the wire values, not just the DB column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickupStatus {
    Requested,
    FindingVendor,
    Assigned,
    OnTheWay,
    Completed,
    Cancelled,
    NoVendorAvailable,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Requested => "REQUESTED",
            PickupStatus::FindingVendor => "FINDING_VENDOR",
            PickupStatus::Assigned => "ASSIGNED",
            PickupStatus::OnTheWay => "ON_THE_WAY",
            PickupStatus::Completed => "COMPLETED",
            PickupStatus::Cancelled => "CANCELLED",
            PickupStatus::NoVendorAvailable => "NO_VENDOR_AVAILABLE",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "REQUESTED" => Ok(PickupStatus::Requested),
            "FINDING_VENDOR" => Ok(PickupStatus::FindingVendor),
            "ASSIGNED" => Ok(PickupStatus::Assigned),
            "ON_THE_WAY" => Ok(PickupStatus::OnTheWay),
            "COMPLETED" => Ok(PickupStatus::Completed),
            "CANCELLED" => Ok(PickupStatus::Cancelled),
            "NO_VENDOR_AVAILABLE" => Ok(PickupStatus::NoVendorAvailable),
            other => Err(format!("invalid pickup status: {other}")),
        }
    }

    /// Terminal statuses: no transition ever leaves them (invariant 3).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PickupStatus::Completed | PickupStatus::Cancelled)
    }

    /// Statuses where the dispatch engine never acts again.
    pub fn is_dispatch_final(&self) -> bool {
        matches!(
            self,
            PickupStatus::Assigned
                | PickupStatus::OnTheWay
                | PickupStatus::Cancelled
                | PickupStatus::Completed
        )
    }
}

impl std::fmt::Display for PickupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pickup
// ---------------------------------------------------------------------------

/// The authoritative, persisted pickup record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_slot: String,
    pub status: PickupStatus,
    /// Vendor currently holding an active offer, OR the accepted vendor.
    /// Null when no offer is outstanding.
    pub assigned_vendor_ref: Option<String>,
    /// Absolute deadline after which an outstanding offer is invalid.
    /// Null when no offer is outstanding.
    pub assignment_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Pickup {
    /// An active offer: FINDING_VENDOR, a vendor is assigned, and its
    /// expiry is strictly in the future relative to `now`.
    pub fn has_active_offer(&self, now: DateTime<Utc>) -> bool {
        self.status == PickupStatus::FindingVendor
            && self.assigned_vendor_ref.is_some()
            && self
                .assignment_expires_at
                .map(|exp| exp > now)
                .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// PickupItem
// ---------------------------------------------------------------------------

/// One scrap-type line item belonging to a pickup. Owned by the parent;
/// cascade-deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupItem {
    pub pickup_id: Uuid,
    pub scrap_type_id: Uuid,
    pub scrap_type_name: String,
    pub estimated_quantity: f64,
}

// ---------------------------------------------------------------------------
// VendorBackend
// ---------------------------------------------------------------------------

/// A registered vendor backend, upserted by vendors via the location
/// side-channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorBackend {
    pub vendor_ref: String,
    pub offer_url: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PickupVendorRejection
// ---------------------------------------------------------------------------

/// Append-only, best-effort rejection memory: excludes `vendor_ref` from
/// future dispatch attempts for `pickup_id`, across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupVendorRejection {
    pub pickup_id: Uuid,
    pub vendor_ref: String,
    pub rejected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Offer payload (outbound, to vendor backends)
// ---------------------------------------------------------------------------

/// JSON body POSTed to a vendor's `/api/offer` endpoint.
///
/// `pickup_id` and `pickupId` duplicate `request_id` for cross-version
/// vendor compatibility; this is deliberate redundancy, not a bug.
#[derive(Debug, Clone, Serialize)]
pub struct OfferPayload {
    pub vendor_id: String,
    pub request_id: Uuid,
    #[serde(rename = "pickupId")]
    pub pickup_id_camel: Uuid,
    pub pickup_id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrap_summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Inbound field-alias tolerance (vendor callbacks)
// ---------------------------------------------------------------------------

/// A vendor callback body, tolerant of the field-name aliases a vendor
/// backend might send: `pickupId | pickup_id | request_id | requestId` and
/// `assignedVendorRef | vendor_id | vendorId`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorCallbackBody {
    #[serde(alias = "pickupId", alias = "request_id", alias = "requestId")]
    pub pickup_id: Uuid,
    #[serde(alias = "assignedVendorRef", alias = "vendor_id", alias = "vendorId")]
    pub vendor_ref: String,
}

/// Body for `POST /api/vendor/location`.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorLocationUpdate {
    pub vendor_ref: String,
    pub offer_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            PickupStatus::Requested,
            PickupStatus::FindingVendor,
            PickupStatus::Assigned,
            PickupStatus::OnTheWay,
            PickupStatus::Completed,
            PickupStatus::Cancelled,
            PickupStatus::NoVendorAvailable,
        ] {
            assert_eq!(PickupStatus::parse(s.as_str()).unwrap(), s);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(PickupStatus::Completed.is_terminal());
        assert!(PickupStatus::Cancelled.is_terminal());
        assert!(!PickupStatus::FindingVendor.is_terminal());
        assert!(!PickupStatus::Assigned.is_terminal());
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(PickupStatus::parse("BOGUS").is_err());
    }

    #[test]
    fn callback_body_accepts_aliases() {
        let id = Uuid::new_v4();
        let body: VendorCallbackBody =
            serde_json::from_value(serde_json::json!({"requestId": id, "vendorId": "v-1"}))
                .unwrap();
        assert_eq!(body.pickup_id, id);
        assert_eq!(body.vendor_ref, "v-1");
    }
}
