//! sv-runtime
//!
//! Mode Controller for the sync validator. Owns the run state machine, the
//! store handles for one run, concurrent gathering of both sides, and the
//! post-decision alert and report steps.

mod controller;
mod error;
pub mod phase;
mod request;
pub mod stores;

pub use controller::{resolve_expectations, Clock, ModeController, RunOptions, RunOutcome};
pub use error::RunError;
pub use phase::{PhaseTracker, RunPhase};
pub use request::ValidationRequest;
pub use stores::{HttpStoreFactory, RunStores, StoreFactory};
