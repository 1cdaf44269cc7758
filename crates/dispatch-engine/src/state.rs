//! The in-memory half of the Dispatch Engine: per-pickup timer handles and
//! the process-local exclusion set (§5, §9 — cheap to lose on restart; the
//! sweeper is the correctness backstop, not this registry).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Everything the engine remembers about one pickup's active dispatch
/// attempt, purely in-process.
#[derive(Default)]
pub struct DispatchSession {
    /// The outstanding offer's expiry timer. `abort()` on accept/reject/cancel
    /// is a no-op if the timer has already fired, per §5.
    pub timer: Option<JoinHandle<()>>,
    /// Vendors that have already timed out or rejected for this pickup in
    /// this process's lifetime — unioned with the persisted rejection log
    /// before ranking (dispatch-geo's exclusion set).
    pub excluded_vendor_refs: HashSet<String>,
}

impl DispatchSession {
    /// Cancel any outstanding timer. Safe to call when none is set.
    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

/// Process-local registry of active dispatch sessions, keyed by pickup id.
#[derive(Clone, Default)]
pub struct DispatchState {
    sessions: Arc<Mutex<HashMap<Uuid, DispatchSession>>>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the session for `pickup_id`, creating one if absent.
    pub async fn with_session<R>(
        &self,
        pickup_id: Uuid,
        f: impl FnOnce(&mut DispatchSession) -> R,
    ) -> R {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(pickup_id).or_default();
        f(session)
    }

    /// Drop a pickup's session entirely (its timer, if any, is aborted
    /// first). Called once a pickup reaches a dispatch-final status.
    pub async fn remove(&self, pickup_id: Uuid) {
        let mut sessions = self.sessions.lock().await;
        if let Some(mut session) = sessions.remove(&pickup_id) {
            session.cancel_timer();
        }
    }
}
