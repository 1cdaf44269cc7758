//! dispatch-testkit
//!
//! An in-memory fake of the Store Gateway ([`InMemoryStore`]) implementing
//! the exact same [`dispatch_db::PickupStore`] trait the production
//! `PgStore` does, reproducing every conditional-update's CAS semantics
//! (status/vendor/expiry guards) without a live Postgres instance. Lets
//! `dispatch-engine`'s actual code run, unmodified, against a fast
//! deterministic substitute: the real engine against a fake I/O
//! dependency, rather than mocking the engine itself.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use chrono::{DateTime, Utc};
use dispatch_db::{LostRace, NewPickup, PickupStore};
use dispatch_schemas::{Pickup, PickupItem, PickupStatus, VendorBackend};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    pickups: HashMap<Uuid, Pickup>,
    items: HashMap<Uuid, Vec<PickupItem>>,
    vendors: HashMap<String, VendorBackend>,
    rejections: HashSet<(Uuid, String)>,
}

/// In-memory stand-in for `dispatch_db::PgStore`. Every method reproduces
/// the exact `WHERE` guard of its Postgres counterpart.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: register a vendor directly, bypassing HTTP.
    pub fn seed_vendor(&self, vendor_ref: &str, offer_url: &str, lat: Option<f64>, lon: Option<f64>) {
        let mut inner = self.inner.lock().unwrap();
        inner.vendors.insert(
            vendor_ref.to_string(),
            VendorBackend {
                vendor_ref: vendor_ref.to_string(),
                offer_url: offer_url.to_string(),
                latitude: lat,
                longitude: lon,
                updated_at: Utc::now(),
            },
        );
    }

    /// Test helper: snapshot a pickup's current row without going through
    /// the trait (assertions want direct access, not `Result<Option<_>>>`).
    pub fn peek(&self, pickup_id: Uuid) -> Option<Pickup> {
        self.inner.lock().unwrap().pickups.get(&pickup_id).cloned()
    }
}

fn lost_race() -> anyhow::Error {
    anyhow::Error::new(LostRace)
}

#[async_trait]
impl PickupStore for InMemoryStore {
    async fn create_pickup(&self, new: &NewPickup) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = Pickup {
            id: new.id,
            customer_id: new.customer_id,
            address: new.address.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            time_slot: new.time_slot.clone(),
            status: PickupStatus::Requested,
            assigned_vendor_ref: None,
            assignment_expires_at: None,
            created_at: Utc::now(),
            cancelled_at: None,
            completed_at: None,
        };
        inner.pickups.insert(new.id, pickup.clone());
        inner.items.insert(
            new.id,
            new.items
                .iter()
                .map(|(scrap_type_id, name, qty)| PickupItem {
                    pickup_id: new.id,
                    scrap_type_id: *scrap_type_id,
                    scrap_type_name: name.clone(),
                    estimated_quantity: *qty,
                })
                .collect(),
        );
        Ok(pickup)
    }

    async fn fetch_pickup(&self, pickup_id: Uuid) -> Result<Option<Pickup>> {
        Ok(self.inner.lock().unwrap().pickups.get(&pickup_id).cloned())
    }

    async fn list_items(&self, pickup_id: Uuid) -> Result<Vec<PickupItem>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .items
            .get(&pickup_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn begin_finding(&self, pickup_id: Uuid) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        if !matches!(
            pickup.status,
            PickupStatus::Requested | PickupStatus::NoVendorAvailable | PickupStatus::FindingVendor
        ) {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::FindingVendor;
        pickup.assigned_vendor_ref = None;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn reserve_offer(
        &self,
        pickup_id: Uuid,
        vendor_ref: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let offer_releasable = pickup.assigned_vendor_ref.is_none()
            || pickup.assignment_expires_at.map(|e| e <= now).unwrap_or(false);
        if pickup.status != PickupStatus::FindingVendor || !offer_releasable {
            return Err(lost_race());
        }
        pickup.assigned_vendor_ref = Some(vendor_ref.to_string());
        pickup.assignment_expires_at = Some(expires_at);
        Ok(pickup.clone())
    }

    async fn clear_expired_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let matches_offer = pickup.status == PickupStatus::FindingVendor
            && pickup.assigned_vendor_ref.as_deref() == Some(vendor_ref)
            && pickup.assignment_expires_at.map(|e| e <= now).unwrap_or(false);
        if !matches_offer {
            return Err(lost_race());
        }
        pickup.assigned_vendor_ref = None;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn confirm_assignment(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let valid = pickup.status == PickupStatus::FindingVendor
            && pickup.assigned_vendor_ref.as_deref() == Some(vendor_ref)
            && pickup.assignment_expires_at.map(|e| e > now).unwrap_or(false);
        if !valid {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::Assigned;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn reject_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let matches_offer =
            pickup.status == PickupStatus::FindingVendor && pickup.assigned_vendor_ref.as_deref() == Some(vendor_ref);
        if !matches_offer {
            return Err(lost_race());
        }
        pickup.assigned_vendor_ref = None;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn give_up(&self, pickup_id: Uuid) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        if pickup.status != PickupStatus::FindingVendor {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::NoVendorAvailable;
        pickup.assigned_vendor_ref = None;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn cancel(&self, pickup_id: Uuid, customer_id: Uuid) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let cancellable = pickup.customer_id == customer_id
            && !matches!(pickup.status, PickupStatus::Cancelled | PickupStatus::Completed);
        if !cancellable {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::Cancelled;
        pickup.cancelled_at = Some(Utc::now());
        pickup.assigned_vendor_ref = None;
        pickup.assignment_expires_at = None;
        Ok(pickup.clone())
    }

    async fn set_on_the_way(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let valid = matches!(pickup.status, PickupStatus::Assigned | PickupStatus::OnTheWay)
            && pickup.assigned_vendor_ref.as_deref() == Some(vendor_ref);
        if !valid {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::OnTheWay;
        Ok(pickup.clone())
    }

    async fn complete(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        let mut inner = self.inner.lock().unwrap();
        let pickup = inner.pickups.get_mut(&pickup_id).ok_or_else(lost_race)?;
        let valid = matches!(pickup.status, PickupStatus::Assigned | PickupStatus::OnTheWay)
            && pickup.assigned_vendor_ref.as_deref() == Some(vendor_ref);
        if !valid {
            return Err(lost_race());
        }
        pickup.status = PickupStatus::Completed;
        pickup.completed_at = Some(Utc::now());
        Ok(pickup.clone())
    }

    async fn sweep_expired(&self) -> Result<Vec<Pickup>> {
        let inner = self.inner.lock().unwrap();
        let now = Utc::now();
        Ok(inner
            .pickups
            .values()
            .filter(|p| {
                p.status == PickupStatus::FindingVendor
                    && p.assigned_vendor_ref.is_some()
                    && p.assignment_expires_at.map(|e| e <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn record_rejection(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .rejections
            .insert((pickup_id, vendor_ref.to_string()));
        Ok(())
    }

    async fn list_rejections(&self, pickup_id: Uuid) -> Result<Vec<String>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .rejections
            .iter()
            .filter(|(id, _)| *id == pickup_id)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn list_vendors(&self) -> Result<Vec<VendorBackend>> {
        Ok(self.inner.lock().unwrap().vendors.values().cloned().collect())
    }

    async fn fetch_vendor(&self, vendor_ref: &str) -> Result<Option<VendorBackend>> {
        Ok(self.inner.lock().unwrap().vendors.get(vendor_ref).cloned())
    }

    async fn upsert_vendor(
        &self,
        vendor_ref: &str,
        offer_url: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<VendorBackend> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.vendors.entry(vendor_ref.to_string()).or_insert_with(|| VendorBackend {
            vendor_ref: vendor_ref.to_string(),
            offer_url: String::new(),
            latitude: None,
            longitude: None,
            updated_at: Utc::now(),
        });
        if let Some(url) = offer_url {
            entry.offer_url = url.to_string();
        }
        entry.latitude = latitude;
        entry.longitude = longitude;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

// ---------------------------------------------------------------------------
// Vendor stub server
// ---------------------------------------------------------------------------

/// A minimal HTTP vendor backend for scenario tests: always answers
/// `/api/offer` with a fixed status and counts how many offers it received.
/// Runs as a background task on an OS-assigned loopback port for the
/// lifetime of the test process (no explicit shutdown — the process exits
/// when the test does).
pub struct VendorStub {
    pub base_url: String,
    received: Arc<AtomicUsize>,
}

impl VendorStub {
    /// Spawn a stub that answers every `/api/offer` POST with `status`.
    pub async fn spawn(status: StatusCode) -> Self {
        let received = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&received);

        let app = axum::Router::new().route(
            "/api/offer",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            received,
        }
    }

    /// A stub that never answers a route dispatch-transport will reach —
    /// simulates an offline vendor (connection refused), for timeout/failure
    /// scenarios without actually waiting out the 10s transport timeout.
    pub fn dead_url() -> String {
        "http://127.0.0.1:1".to_string()
    }

    pub fn offers_received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}
