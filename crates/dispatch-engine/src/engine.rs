//! The Dispatch Engine: generalizes a single-process-order state machine
//! to a pickup whose authoritative state lives behind a [`PickupStore`].
//! Every mutation re-reads (or re-derives
//! from a `RETURNING` row) the pickup it touches rather than trusting
//! in-memory state — the in-memory [`DispatchState`] registry only ever
//! holds timers and a process-local exclusion set, never the pickup's
//! status itself. Generic over the store so `dispatch-testkit` can run the
//! exact same engine against an in-memory fake.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dispatch_db::PickupStore;
use dispatch_schemas::{OfferPayload, Pickup, PickupStatus, VendorBackend};
use tracing::{error, info, warn};
use uuid::Uuid;

use dispatch_transport::OfferTransport;

use crate::state::DispatchState;

/// Default lifetime of an outstanding offer before it can no longer be
/// accepted: 2 minutes. Overridable via
/// [`DispatchEngine::with_offer_timeout`].
pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Slack added on top of the offer timeout before the in-process timer
/// actually fires, so the timer never races the deadline: the sweeper's
/// `now < assignment_expires_at` check is strict, so the timer must never
/// fire before the deadline has actually passed.
const TIMER_GRACE: Duration = Duration::from_secs(1);

/// The Dispatch Engine: ranking, offer emission, and accept/reject/timeout
/// handling for every pickup in FINDING_VENDOR.
pub struct DispatchEngine<S: PickupStore> {
    store: Arc<S>,
    transport: OfferTransport,
    state: DispatchState,
    offer_timeout: Duration,
}

// Written by hand rather than `#[derive(Clone)]`: the derive macro bounds
// `S: Clone`, but cloning only ever touches the `Arc<S>` handle.
impl<S: PickupStore> Clone for DispatchEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: self.transport.clone(),
            state: self.state.clone(),
            offer_timeout: self.offer_timeout,
        }
    }
}

impl<S: PickupStore + 'static> DispatchEngine<S> {
    pub fn new(store: Arc<S>, transport: OfferTransport) -> Self {
        Self {
            store,
            transport,
            state: DispatchState::new(),
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
        }
    }

    pub fn with_offer_timeout(mut self, timeout: Duration) -> Self {
        self.offer_timeout = timeout;
        self
    }

    // -----------------------------------------------------------------
    // Vendor Directory passthrough (§4.2)
    // -----------------------------------------------------------------

    pub async fn list_vendors(&self) -> anyhow::Result<Vec<VendorBackend>> {
        self.store.list_vendors().await
    }

    pub async fn upsert_vendor(
        &self,
        vendor_ref: &str,
        offer_url: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> anyhow::Result<VendorBackend> {
        self.store
            .upsert_vendor(vendor_ref, offer_url, latitude, longitude)
            .await
    }

    pub async fn fetch_vendor(&self, vendor_ref: &str) -> anyhow::Result<Option<VendorBackend>> {
        self.store.fetch_vendor(vendor_ref).await
    }

    // -----------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------

    /// Create a new pickup in REQUESTED.
    pub async fn create_pickup(&self, new: &dispatch_db::NewPickup) -> anyhow::Result<Pickup> {
        self.store.create_pickup(new).await
    }

    pub async fn fetch_pickup(&self, pickup_id: Uuid) -> anyhow::Result<Option<Pickup>> {
        self.store.fetch_pickup(pickup_id).await
    }

    pub async fn list_items(&self, pickup_id: Uuid) -> anyhow::Result<Vec<dispatch_schemas::PickupItem>> {
        self.store.list_items(pickup_id).await
    }

    /// Begin (or retry) dispatch for a pickup. `skip_vendor_refs` seeds the
    /// in-memory exclusion set for this attempt (caller-supplied, e.g. a
    /// customer explicitly skipping a vendor).
    ///
    /// No-op (returns the current row unchanged) whenever a terminal status
    /// or an already-valid unexpired offer is in play: another actor is
    /// already dispatching, or there's nothing left to do.
    pub async fn dispatch(&self, pickup_id: Uuid, skip_vendor_refs: &[String]) -> anyhow::Result<Pickup> {
        let current = self.fetch_required(pickup_id).await?;
        if current.status.is_dispatch_final() {
            return Ok(current);
        }
        if current.has_active_offer(Utc::now()) {
            return Ok(current);
        }

        self.store.begin_finding(pickup_id).await?;
        if !skip_vendor_refs.is_empty() {
            self.state
                .with_session(pickup_id, |s| {
                    s.excluded_vendor_refs
                        .extend(skip_vendor_refs.iter().cloned());
                })
                .await;
        }
        self.advance(pickup_id).await
    }

    /// Customer cancels the pickup outright.
    pub async fn cancel(&self, pickup_id: Uuid, customer_id: Uuid) -> anyhow::Result<Pickup> {
        let pickup = self.store.cancel(pickup_id, customer_id).await?;
        self.state.remove(pickup_id).await;
        Ok(pickup)
    }

    /// Vendor marks the assigned pickup as on the way.
    pub async fn on_vendor_on_the_way(&self, pickup_id: Uuid, vendor_ref: &str) -> anyhow::Result<Pickup> {
        self.store.set_on_the_way(pickup_id, vendor_ref).await
    }

    /// Vendor marks the pickup as done.
    pub async fn on_vendor_complete(&self, pickup_id: Uuid, vendor_ref: &str) -> anyhow::Result<Pickup> {
        let pickup = self.store.complete(pickup_id, vendor_ref).await?;
        self.state.remove(pickup_id).await;
        Ok(pickup)
    }

    /// Vendor accepts its outstanding offer.
    pub async fn on_accept(&self, pickup_id: Uuid, vendor_ref: &str) -> anyhow::Result<Pickup> {
        let pickup = self.store.confirm_assignment(pickup_id, vendor_ref).await?;
        self.state
            .with_session(pickup_id, |s| s.cancel_timer())
            .await;
        self.state.remove(pickup_id).await;
        info!(%pickup_id, vendor_ref, "vendor accepted offer");
        Ok(pickup)
    }

    /// Vendor rejects its outstanding offer. Always records the rejection
    /// (Open Question resolution: conservative, even on a late reject that
    /// loses the CAS race against an accept or the sweeper).
    pub async fn on_reject(&self, pickup_id: Uuid, vendor_ref: &str) -> anyhow::Result<Pickup> {
        self.store.record_rejection(pickup_id, vendor_ref).await?;

        match self.store.reject_offer(pickup_id, vendor_ref).await {
            Ok(_) => {
                self.state
                    .with_session(pickup_id, |s| {
                        s.cancel_timer();
                        s.excluded_vendor_refs.insert(vendor_ref.to_string());
                    })
                    .await;
                self.advance(pickup_id).await
            }
            Err(e) if is_lost_race(&e) => {
                warn!(%pickup_id, vendor_ref, "late reject: offer already moved on");
                self.fetch_required(pickup_id).await
            }
            Err(e) => Err(e),
        }
    }

    /// Fired when an offer's timer elapses without an accept or reject.
    /// Called from a background task, never from an HTTP handler — errors
    /// are logged, not propagated.
    pub async fn on_timeout(&self, pickup_id: Uuid, vendor_ref: String) {
        match self.store.clear_expired_offer(pickup_id, &vendor_ref).await {
            Ok(_) => {
                self.state
                    .with_session(pickup_id, |s| {
                        s.excluded_vendor_refs.insert(vendor_ref.clone());
                    })
                    .await;
                if let Err(e) = self.advance(pickup_id).await {
                    error!(%pickup_id, vendor_ref, error = %e, "advance after timeout failed");
                }
            }
            Err(e) if is_lost_race(&e) => {
                // Accepted, rejected, or already swept by someone else — fine.
            }
            Err(e) => error!(%pickup_id, vendor_ref, error = %e, "clear_expired_offer failed"),
        }
    }

    /// The cross-restart backstop (§4.7): reclaim every pickup whose offer
    /// has expired, regardless of whether this process ever held a timer for
    /// it. Returns the number of pickups advanced.
    pub async fn sweep_expired(&self) -> anyhow::Result<usize> {
        let expired = self.store.sweep_expired().await?;
        let mut advanced = 0;
        for pickup in expired {
            let Some(vendor_ref) = pickup.assigned_vendor_ref.clone() else {
                continue;
            };
            match self.store.clear_expired_offer(pickup.id, &vendor_ref).await {
                Ok(_) => {
                    self.state
                        .with_session(pickup.id, |s| {
                            s.cancel_timer();
                            s.excluded_vendor_refs.insert(vendor_ref.clone());
                        })
                        .await;
                    if let Err(e) = self.advance(pickup.id).await {
                        error!(pickup_id = %pickup.id, error = %e, "sweep advance failed");
                    } else {
                        advanced += 1;
                    }
                }
                Err(e) if is_lost_race(&e) => {}
                Err(e) => error!(pickup_id = %pickup.id, error = %e, "sweep clear_expired_offer failed"),
            }
        }
        Ok(advanced)
    }

    // -----------------------------------------------------------------
    // Core loop
    // -----------------------------------------------------------------

    /// Rank remaining candidates, reserve the nearest one, and emit an
    /// offer. Loops internally past vendors whose offer send fails outright
    /// (treated as an immediate self-exclusion, not a customer-visible
    /// error) until one candidate succeeds or the ranked list is exhausted.
    pub async fn advance(&self, pickup_id: Uuid) -> anyhow::Result<Pickup> {
        loop {
            let pickup = self.fetch_required(pickup_id).await?;
            if pickup.status != PickupStatus::FindingVendor {
                return Ok(pickup);
            }

            let vendors = self.store.list_vendors().await?;
            let persisted_rejections = self.store.list_rejections(pickup_id).await?;
            let excluded: HashSet<String> = self
                .state
                .with_session(pickup_id, |s| s.excluded_vendor_refs.clone())
                .await
                .into_iter()
                .chain(persisted_rejections)
                .collect();

            let ranked =
                dispatch_geo::rank_candidates(pickup.latitude, pickup.longitude, vendors, &excluded);

            let Some(candidate) = ranked.into_iter().next() else {
                let pickup = self.store.give_up(pickup_id).await?;
                self.state.remove(pickup_id).await;
                info!(%pickup_id, "ranking exhausted: NO_VENDOR_AVAILABLE");
                return Ok(pickup);
            };

            let vendor_ref = candidate.vendor.vendor_ref;
            let expires_at = Utc::now() + chrono::Duration::from_std(self.offer_timeout).unwrap();

            let reserved = match self.store.reserve_offer(pickup_id, &vendor_ref, expires_at).await {
                Ok(p) => p,
                Err(e) if is_lost_race(&e) => {
                    // Someone else is already mid-dispatch for this pickup; report
                    // its current state rather than retrying blindly.
                    return self.fetch_required(pickup_id).await;
                }
                Err(e) => return Err(e),
            };

            let payload = self.build_offer_payload(&reserved, &vendor_ref).await?;

            match self.transport.send_offer(&candidate.vendor.offer_url, &payload).await {
                Ok(()) => {
                    self.arm_timer(pickup_id, vendor_ref.clone(), expires_at).await;
                    info!(%pickup_id, vendor_ref, "offer sent");
                    return Ok(reserved);
                }
                Err(e) => {
                    warn!(%pickup_id, vendor_ref, error = %e, "offer send failed, excluding and retrying");
                    // Clearing the reservation is best-effort: if it loses the
                    // race, something else already moved this pickup along.
                    let _ = self.store.reject_offer(pickup_id, &vendor_ref).await;
                    self.state
                        .with_session(pickup_id, |s| {
                            s.excluded_vendor_refs.insert(vendor_ref);
                        })
                        .await;
                    continue;
                }
            }
        }
    }

    async fn build_offer_payload(&self, pickup: &Pickup, vendor_ref: &str) -> anyhow::Result<OfferPayload> {
        let items = self.store.list_items(pickup.id).await?;
        let scrap_summary = if items.is_empty() {
            None
        } else {
            Some(
                items
                    .iter()
                    .map(|i| format!("{}: {}", i.scrap_type_name, i.estimated_quantity))
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };

        Ok(OfferPayload {
            vendor_id: vendor_ref.to_string(),
            request_id: pickup.id,
            pickup_id_camel: pickup.id,
            pickup_id: pickup.id,
            latitude: pickup.latitude,
            longitude: pickup.longitude,
            scrap_summary,
        })
    }

    async fn arm_timer(&self, pickup_id: Uuid, vendor_ref: String, expires_at: chrono::DateTime<Utc>) {
        let engine = self.clone();
        let fire_at = expires_at + chrono::Duration::from_std(TIMER_GRACE).unwrap();
        let handle = tokio::spawn(async move {
            let now = Utc::now();
            if fire_at > now {
                let dur = (fire_at - now).to_std().unwrap_or_default();
                tokio::time::sleep(dur).await;
            }
            engine.on_timeout(pickup_id, vendor_ref).await;
        });

        self.state
            .with_session(pickup_id, |s| {
                s.cancel_timer();
                s.timer = Some(handle);
            })
            .await;
    }

    async fn fetch_required(&self, pickup_id: Uuid) -> anyhow::Result<Pickup> {
        self.store
            .fetch_pickup(pickup_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("pickup {pickup_id} not found"))
    }
}

fn is_lost_race(err: &anyhow::Error) -> bool {
    err.downcast_ref::<dispatch_db::LostRace>().is_some()
}
