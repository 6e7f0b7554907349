//! sv-reconcile
//!
//! Decision core of the sync validator:
//! - expectation resolution from mode, explicit names or prefix templates
//! - source/target reconciliation into an ordered discrepancy list
//! - the daily/weekly verdict and the run result it produces
//!
//! Deterministic, pure logic. No IO. No store calls. No clock reads.

mod engine;
pub mod expectation;
pub mod gate;
pub mod result;
mod types;

pub use engine::reconcile;
pub use expectation::{resolve, ResolveRequest, DEFAULT_PREFIX_TEMPLATES};
pub use gate::{decide, RunVerdict};
pub use result::{RunResult, COMPACT_TS_FORMAT};
pub use types::*;
