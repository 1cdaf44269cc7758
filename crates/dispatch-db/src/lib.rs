//! dispatch-db
//!
//! The Store Gateway: every primitive that reads or conditionally updates a
//! `pickups` row lives here. Every mutation re-fetches (or re-derives from
//! a `RETURNING` clause) the row it touched, and a primitive whose `WHERE`
//! clause matched zero rows returns [`LostRace`] rather than silently
//! succeeding or guessing at what happened. Callers above this crate never
//! write SQL of their own.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dispatch_schemas::{Pickup, PickupItem, PickupStatus, VendorBackend};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const ENV_DB_URL: &str = "DISPATCH_DATABASE_URL";

/// Connect to Postgres using `DISPATCH_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Connect to Postgres at `url` with the shared pool configuration.
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations. The daemon refuses to bind its listener if
/// this fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query: connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'pickups'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_pickups_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_pickups_table: bool,
}

// ---------------------------------------------------------------------------
// LostRace
// ---------------------------------------------------------------------------

/// Marker error: a conditional update's `WHERE` clause matched zero rows.
/// Another actor won the race (or the precondition simply no longer holds).
/// This is an expected, routine outcome, not a bug — callers downcast for it
/// rather than pattern-matching on error message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LostRace;

impl std::fmt::Display for LostRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lost the race: conditional update matched no rows")
    }
}

impl std::error::Error for LostRace {}

fn lost_race() -> anyhow::Error {
    anyhow::Error::new(LostRace)
}

// ---------------------------------------------------------------------------
// Pickup row mapping
// ---------------------------------------------------------------------------

fn row_to_pickup(row: sqlx::postgres::PgRow) -> Result<Pickup> {
    let status_raw: String = row.try_get("status")?;
    Ok(Pickup {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        address: row.try_get("address")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        time_slot: row.try_get("time_slot")?,
        status: PickupStatus::parse(&status_raw).map_err(anyhow::Error::msg)?,
        assigned_vendor_ref: row.try_get("assigned_vendor_ref")?,
        assignment_expires_at: row.try_get("assignment_expires_at")?,
        created_at: row.try_get("created_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

const PICKUP_COLUMNS: &str = "id, customer_id, address, latitude, longitude, time_slot, status, \
     assigned_vendor_ref, assignment_expires_at, created_at, cancelled_at, completed_at";

/// Arguments to create a new pickup.
#[derive(Debug, Clone)]
pub struct NewPickup {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time_slot: String,
    pub items: Vec<(Uuid, String, f64)>,
}

/// Insert a new pickup (status REQUESTED) and its line items in one
/// transaction.
pub async fn create_pickup(pool: &PgPool, new: &NewPickup) -> Result<Pickup> {
    let mut tx = pool.begin().await.context("create_pickup begin tx")?;

    let row = sqlx::query(&format!(
        r#"
        insert into pickups (id, customer_id, address, latitude, longitude, time_slot, status)
        values ($1, $2, $3, $4, $5, $6, 'REQUESTED')
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(new.id)
    .bind(new.customer_id)
    .bind(&new.address)
    .bind(new.latitude)
    .bind(new.longitude)
    .bind(&new.time_slot)
    .fetch_one(&mut *tx)
    .await
    .context("create_pickup insert failed")?;

    for (scrap_type_id, scrap_type_name, quantity) in &new.items {
        sqlx::query(
            r#"
            insert into pickup_items (pickup_id, scrap_type_id, scrap_type_name, estimated_quantity)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(new.id)
        .bind(scrap_type_id)
        .bind(scrap_type_name)
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .context("create_pickup item insert failed")?;
    }

    tx.commit().await.context("create_pickup commit failed")?;

    info!(pickup_id = %new.id, "pickup created");
    row_to_pickup(row)
}

/// Fetch a pickup by id. `Ok(None)` if it does not exist.
pub async fn fetch_pickup(pool: &PgPool, pickup_id: Uuid) -> Result<Option<Pickup>> {
    let row = sqlx::query(&format!("select {PICKUP_COLUMNS} from pickups where id = $1"))
        .bind(pickup_id)
        .fetch_optional(pool)
        .await
        .context("fetch_pickup failed")?;

    row.map(row_to_pickup).transpose()
}

/// Line items belonging to a pickup.
pub async fn list_items(pool: &PgPool, pickup_id: Uuid) -> Result<Vec<PickupItem>> {
    let rows = sqlx::query(
        "select pickup_id, scrap_type_id, scrap_type_name, estimated_quantity \
         from pickup_items where pickup_id = $1",
    )
    .bind(pickup_id)
    .fetch_all(pool)
    .await
    .context("list_items failed")?;

    rows.into_iter()
        .map(|row| {
            Ok(PickupItem {
                pickup_id: row.try_get("pickup_id")?,
                scrap_type_id: row.try_get("scrap_type_id")?,
                scrap_type_name: row.try_get("scrap_type_name")?,
                estimated_quantity: row.try_get("estimated_quantity")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Conditional updates
// ---------------------------------------------------------------------------

/// REQUESTED, NO_VENDOR_AVAILABLE, or FINDING_VENDOR -> FINDING_VENDOR,
/// clearing any stale offer fields. Idempotent over all three statuses.
/// The FINDING_VENDOR case is only ever reached once the caller has
/// confirmed no unexpired offer is outstanding, so clearing
/// `assigned_vendor_ref` here never clobbers a live offer.
pub async fn begin_finding(pool: &PgPool, pickup_id: Uuid) -> Result<Pickup> {
    debug!(%pickup_id, "begin_finding: attempting");
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'FINDING_VENDOR',
               assigned_vendor_ref = null,
               assignment_expires_at = null
         where id = $1
           and status in ('REQUESTED', 'NO_VENDOR_AVAILABLE', 'FINDING_VENDOR')
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .fetch_optional(pool)
    .await
    .context("begin_finding update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, "begin_finding: now FINDING_VENDOR");
            row_to_pickup(row)
        }
        None => {
            warn!(%pickup_id, "begin_finding: lost race or invalid state");
            Err(lost_race())
        }
    }
}

/// Reserve an outstanding offer to `vendor_ref`, expiring at `expires_at`.
/// Only succeeds while FINDING_VENDOR and no other offer is currently
/// outstanding (no `assigned_vendor_ref`, or its expiry has already passed).
pub async fn reserve_offer(
    pool: &PgPool,
    pickup_id: Uuid,
    vendor_ref: &str,
    expires_at: DateTime<Utc>,
) -> Result<Pickup> {
    debug!(%pickup_id, vendor_ref, "reserve_offer: attempting");
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set assigned_vendor_ref = $2,
               assignment_expires_at = $3
         where id = $1
           and status = 'FINDING_VENDOR'
           and (assigned_vendor_ref is null or assignment_expires_at <= now())
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .bind(expires_at)
    .fetch_optional(pool)
    .await
    .context("reserve_offer update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, vendor_ref, "reserve_offer: reserved");
            row_to_pickup(row)
        }
        None => {
            warn!(%pickup_id, vendor_ref, "reserve_offer: lost race");
            Err(lost_race())
        }
    }
}

/// Clear an expired offer so the next ranking pass can reserve a new one.
/// Only succeeds if the offer on file is still `vendor_ref` and has in fact
/// expired — a concurrent accept wins this race.
pub async fn clear_expired_offer(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set assigned_vendor_ref = null,
               assignment_expires_at = null
         where id = $1
           and status = 'FINDING_VENDOR'
           and assigned_vendor_ref = $2
           and assignment_expires_at <= now()
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("clear_expired_offer update failed")?;

    match row {
        Some(row) => row_to_pickup(row),
        None => Err(lost_race()),
    }
}

/// FINDING_VENDOR with the matching outstanding offer -> ASSIGNED. Accepts
/// strictly before expiry are accepted here; a late accept loses the race
/// to the sweeper, which will already have cleared the offer.
pub async fn confirm_assignment(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
    debug!(%pickup_id, vendor_ref, "confirm_assignment: attempting");
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'ASSIGNED'
         where id = $1
           and status = 'FINDING_VENDOR'
           and assigned_vendor_ref = $2
           and assignment_expires_at > now()
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("confirm_assignment update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, vendor_ref, "confirm_assignment: ASSIGNED");
            row_to_pickup(row)
        }
        None => {
            warn!(%pickup_id, vendor_ref, "confirm_assignment: lost race");
            Err(lost_race())
        }
    }
}

/// Vendor rejects: clear the reservation so ranking can move to the next
/// candidate. Only succeeds while the offer on file is still `vendor_ref`.
pub async fn reject_offer(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
    debug!(%pickup_id, vendor_ref, "reject_offer: attempting");
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set assigned_vendor_ref = null,
               assignment_expires_at = null
         where id = $1
           and status = 'FINDING_VENDOR'
           and assigned_vendor_ref = $2
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("reject_offer update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, vendor_ref, "reject_offer: offer cleared");
            row_to_pickup(row)
        }
        None => {
            warn!(%pickup_id, vendor_ref, "reject_offer: lost race (late reject)");
            Err(lost_race())
        }
    }
}

/// Ranking exhausted every candidate: FINDING_VENDOR -> NO_VENDOR_AVAILABLE.
pub async fn give_up(pool: &PgPool, pickup_id: Uuid) -> Result<Pickup> {
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'NO_VENDOR_AVAILABLE',
               assigned_vendor_ref = null,
               assignment_expires_at = null
         where id = $1
           and status = 'FINDING_VENDOR'
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .fetch_optional(pool)
    .await
    .context("give_up update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, "give_up: NO_VENDOR_AVAILABLE");
            row_to_pickup(row)
        }
        None => Err(lost_race()),
    }
}

/// Customer cancels: any non-terminal status -> CANCELLED, scoped to the
/// owning customer. CANCELLED is itself absorbing, so this also covers a
/// pickup that's already cancelled (the update simply matches zero rows).
pub async fn cancel(pool: &PgPool, pickup_id: Uuid, customer_id: Uuid) -> Result<Pickup> {
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'CANCELLED',
               cancelled_at = now()
         where id = $1
           and customer_id = $2
           and status not in ('CANCELLED', 'COMPLETED')
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(customer_id)
    .fetch_optional(pool)
    .await
    .context("cancel update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, "cancel: CANCELLED");
            row_to_pickup(row)
        }
        None => Err(lost_race()),
    }
}

/// {ASSIGNED, ON_THE_WAY} -> ON_THE_WAY, only for the vendor holding the
/// assignment. Idempotent on an already-ON_THE_WAY pickup.
pub async fn set_on_the_way(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'ON_THE_WAY'
         where id = $1
           and status in ('ASSIGNED', 'ON_THE_WAY')
           and assigned_vendor_ref = $2
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("set_on_the_way update failed")?;

    match row {
        Some(row) => row_to_pickup(row),
        None => Err(lost_race()),
    }
}

/// {ASSIGNED, ON_THE_WAY} -> COMPLETED, only for the vendor holding the
/// assignment.
pub async fn complete(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
    let row = sqlx::query(&format!(
        r#"
        update pickups
           set status = 'COMPLETED',
               completed_at = now()
         where id = $1
           and status in ('ASSIGNED', 'ON_THE_WAY')
           and assigned_vendor_ref = $2
        returning {PICKUP_COLUMNS}
        "#
    ))
    .bind(pickup_id)
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("complete update failed")?;

    match row {
        Some(row) => {
            info!(%pickup_id, vendor_ref, "complete: COMPLETED");
            row_to_pickup(row)
        }
        None => Err(lost_race()),
    }
}

/// Rows whose outstanding offer has expired, at the instant of the call.
/// Used by the sweeper as the cross-restart backstop.
pub async fn sweep_expired(pool: &PgPool) -> Result<Vec<Pickup>> {
    let rows = sqlx::query(&format!(
        "select {PICKUP_COLUMNS} from pickups \
         where status = 'FINDING_VENDOR' \
           and assigned_vendor_ref is not null \
           and assignment_expires_at <= now()"
    ))
    .fetch_all(pool)
    .await
    .context("sweep_expired query failed")?;

    rows.into_iter().map(row_to_pickup).collect()
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Record a rejection for `pickup_id`/`vendor_ref`. Always recorded, even if
/// the caller's subsequent `reject_offer` call loses its own race — this is
/// the conservative choice for late rejects.
pub async fn record_rejection(pool: &PgPool, pickup_id: Uuid, vendor_ref: &str) -> Result<()> {
    sqlx::query(
        r#"
        insert into pickup_vendor_rejections (pickup_id, vendor_ref)
        values ($1, $2)
        on conflict (pickup_id, vendor_ref) do update set rejected_at = now()
        "#,
    )
    .bind(pickup_id)
    .bind(vendor_ref)
    .execute(pool)
    .await
    .context("record_rejection failed")?;
    Ok(())
}

/// Every vendor_ref that has ever rejected this pickup.
pub async fn list_rejections(pool: &PgPool, pickup_id: Uuid) -> Result<Vec<String>> {
    let rows = sqlx::query("select vendor_ref from pickup_vendor_rejections where pickup_id = $1")
        .bind(pickup_id)
        .fetch_all(pool)
        .await
        .context("list_rejections failed")?;

    rows.into_iter()
        .map(|row| row.try_get::<String, _>("vendor_ref").map_err(Into::into))
        .collect()
}

// ---------------------------------------------------------------------------
// Vendor directory
// ---------------------------------------------------------------------------

fn row_to_vendor(row: sqlx::postgres::PgRow) -> Result<VendorBackend> {
    Ok(VendorBackend {
        vendor_ref: row.try_get("vendor_ref")?,
        offer_url: row.try_get("offer_url")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Every registered vendor backend. No liveness filtering is applied — a
/// stale row still consumes a full ranking/timeout slot.
pub async fn list_vendors(pool: &PgPool) -> Result<Vec<VendorBackend>> {
    let rows = sqlx::query(
        "select vendor_ref, offer_url, latitude, longitude, updated_at from vendor_backends",
    )
    .fetch_all(pool)
    .await
    .context("list_vendors failed")?;

    rows.into_iter().map(row_to_vendor).collect()
}

/// A single vendor by ref, if registered.
pub async fn fetch_vendor(pool: &PgPool, vendor_ref: &str) -> Result<Option<VendorBackend>> {
    let row = sqlx::query(
        "select vendor_ref, offer_url, latitude, longitude, updated_at \
         from vendor_backends where vendor_ref = $1",
    )
    .bind(vendor_ref)
    .fetch_optional(pool)
    .await
    .context("fetch_vendor failed")?;

    row.map(row_to_vendor).transpose()
}

/// Insert or update a vendor backend. When `offer_url` is `None`, the
/// previously stored value is reused rather than cleared.
pub async fn upsert_vendor(
    pool: &PgPool,
    vendor_ref: &str,
    offer_url: Option<&str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<VendorBackend> {
    let row = sqlx::query(
        r#"
        insert into vendor_backends (vendor_ref, offer_url, latitude, longitude, updated_at)
        values ($1, coalesce($2, ''), $3, $4, now())
        on conflict (vendor_ref) do update
           set offer_url = coalesce($2, vendor_backends.offer_url),
               latitude = $3,
               longitude = $4,
               updated_at = now()
        returning vendor_ref, offer_url, latitude, longitude, updated_at
        "#,
    )
    .bind(vendor_ref)
    .bind(offer_url)
    .bind(latitude)
    .bind(longitude)
    .fetch_one(pool)
    .await
    .context("upsert_vendor failed")?;

    info!(vendor_ref, "vendor backend upserted");
    row_to_vendor(row)
}

// ---------------------------------------------------------------------------
// PickupStore — the trait dispatch-engine is generic over
// ---------------------------------------------------------------------------

/// Every Store Gateway primitive the Dispatch Engine needs, as a trait so
/// `dispatch-testkit` can substitute an in-memory fake for scenario tests
/// without a live Postgres instance. [`PgStore`] is the production
/// implementation; its methods are thin wrappers over the free functions
/// above (kept free-standing because they're independently useful and
/// independently unit-tested).
#[async_trait::async_trait]
pub trait PickupStore: Send + Sync {
    async fn create_pickup(&self, new: &NewPickup) -> Result<Pickup>;
    async fn fetch_pickup(&self, pickup_id: Uuid) -> Result<Option<Pickup>>;
    async fn list_items(&self, pickup_id: Uuid) -> Result<Vec<PickupItem>>;
    async fn begin_finding(&self, pickup_id: Uuid) -> Result<Pickup>;
    async fn reserve_offer(
        &self,
        pickup_id: Uuid,
        vendor_ref: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Pickup>;
    async fn clear_expired_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup>;
    async fn confirm_assignment(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup>;
    async fn reject_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup>;
    async fn give_up(&self, pickup_id: Uuid) -> Result<Pickup>;
    async fn cancel(&self, pickup_id: Uuid, customer_id: Uuid) -> Result<Pickup>;
    async fn set_on_the_way(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup>;
    async fn complete(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup>;
    async fn sweep_expired(&self) -> Result<Vec<Pickup>>;
    async fn record_rejection(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<()>;
    async fn list_rejections(&self, pickup_id: Uuid) -> Result<Vec<String>>;
    async fn list_vendors(&self) -> Result<Vec<VendorBackend>>;
    async fn fetch_vendor(&self, vendor_ref: &str) -> Result<Option<VendorBackend>>;
    async fn upsert_vendor(
        &self,
        vendor_ref: &str,
        offer_url: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<VendorBackend>;
}

/// The production [`PickupStore`]: a thin `Clone`-able handle around a
/// `PgPool`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl PickupStore for PgStore {
    async fn create_pickup(&self, new: &NewPickup) -> Result<Pickup> {
        create_pickup(&self.pool, new).await
    }

    async fn fetch_pickup(&self, pickup_id: Uuid) -> Result<Option<Pickup>> {
        fetch_pickup(&self.pool, pickup_id).await
    }

    async fn list_items(&self, pickup_id: Uuid) -> Result<Vec<PickupItem>> {
        list_items(&self.pool, pickup_id).await
    }

    async fn begin_finding(&self, pickup_id: Uuid) -> Result<Pickup> {
        begin_finding(&self.pool, pickup_id).await
    }

    async fn reserve_offer(
        &self,
        pickup_id: Uuid,
        vendor_ref: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Pickup> {
        reserve_offer(&self.pool, pickup_id, vendor_ref, expires_at).await
    }

    async fn clear_expired_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        clear_expired_offer(&self.pool, pickup_id, vendor_ref).await
    }

    async fn confirm_assignment(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        confirm_assignment(&self.pool, pickup_id, vendor_ref).await
    }

    async fn reject_offer(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        reject_offer(&self.pool, pickup_id, vendor_ref).await
    }

    async fn give_up(&self, pickup_id: Uuid) -> Result<Pickup> {
        give_up(&self.pool, pickup_id).await
    }

    async fn cancel(&self, pickup_id: Uuid, customer_id: Uuid) -> Result<Pickup> {
        cancel(&self.pool, pickup_id, customer_id).await
    }

    async fn set_on_the_way(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        set_on_the_way(&self.pool, pickup_id, vendor_ref).await
    }

    async fn complete(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<Pickup> {
        complete(&self.pool, pickup_id, vendor_ref).await
    }

    async fn sweep_expired(&self) -> Result<Vec<Pickup>> {
        sweep_expired(&self.pool).await
    }

    async fn record_rejection(&self, pickup_id: Uuid, vendor_ref: &str) -> Result<()> {
        record_rejection(&self.pool, pickup_id, vendor_ref).await
    }

    async fn list_rejections(&self, pickup_id: Uuid) -> Result<Vec<String>> {
        list_rejections(&self.pool, pickup_id).await
    }

    async fn list_vendors(&self) -> Result<Vec<VendorBackend>> {
        list_vendors(&self.pool).await
    }

    async fn fetch_vendor(&self, vendor_ref: &str) -> Result<Option<VendorBackend>> {
        fetch_vendor(&self.pool, vendor_ref).await
    }

    async fn upsert_vendor(
        &self,
        vendor_ref: &str,
        offer_url: Option<&str>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<VendorBackend> {
        upsert_vendor(&self.pool, vendor_ref, offer_url, latitude, longitude).await
    }
}
