//! Shared runtime state for sv-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Runs are serialized:
//! an HTTP request and a scheduled run never overlap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sv_runtime::{ModeController, RunError, RunOptions, RunOutcome, ValidationRequest};
use tokio::sync::{Mutex, RwLock};

/// What started a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Http,
    Schedule,
}

/// A completed run as kept by the daemon.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub trigger: Trigger,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Shared by every Axum handler and the scheduler.
pub struct AppState {
    pub build: BuildInfo,
    pub controller: Arc<ModeController>,
    /// Most recent completed run, if any.
    pub latest: RwLock<Option<RunRecord>>,
    run_gate: Mutex<()>,
}

impl AppState {
    pub fn new(controller: ModeController) -> Self {
        Self {
            build: BuildInfo {
                service: "sv-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            controller: Arc::new(controller),
            latest: RwLock::new(None),
            run_gate: Mutex::new(()),
        }
    }

    /// Run one validation and remember it as the latest run.
    ///
    /// Aborted runs are not recorded; they have no result.
    pub async fn execute(&self, req: &ValidationRequest, trigger: Trigger) -> Result<RunRecord, RunError> {
        let _gate = self.run_gate.lock().await;
        let outcome = self.controller.run(req, RunOptions::default()).await?;
        let record = RunRecord {
            trigger,
            finished_at: Utc::now(),
            outcome,
        };
        *self.latest.write().await = Some(record.clone());
        Ok(record)
    }
}
