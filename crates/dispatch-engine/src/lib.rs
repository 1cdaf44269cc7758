//! dispatch-engine
//!
//! The Dispatch Engine and its in-memory companion state
//! (timers, process-local exclusion set). Generic over [`dispatch_db::PickupStore`]
//! so `dispatch-testkit` can run the identical engine against an in-memory
//! fake store.

mod engine;
mod state;

pub use engine::{DispatchEngine, DEFAULT_OFFER_TIMEOUT};
pub use state::{DispatchSession, DispatchState};
