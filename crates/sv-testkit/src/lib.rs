//! sv-testkit
//!
//! In-memory collaborators for end-to-end runs of the validator:
//! - [`MemoryStore`]: paginated object store with per-key and listing faults
//! - [`MemoryStoreFactory`]: hands a pair of memory stores to the controller
//! - [`RecordingTransport`]: email/topic transport that records or fails
//! - [`MemoryReportSink`]: captures report files instead of writing them
//!
//! Scenario tests live under `tests/`.

mod sinks;
mod stores;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use sv_alert::{AlertChannel, AlertDispatcher};
use sv_config::{load_layered_yaml_from_strings, ValidatorConfig};
use sv_runtime::{Clock, ModeController};

pub use sinks::{MemoryReportSink, RecordingTransport, SentAlert};
pub use stores::{MemoryStore, MemoryStoreFactory};

/// Reference instant used by the scenarios: 2025-01-01T06:00:00Z.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

/// Minimal config naming `uat` -> `landing-uat`.
pub const BASE_CONFIG: &str = r#"
environment: uat
environments:
  uat: { container: uat, bucket: landing-uat }
runtime:
  call_timeout_secs: 5
  probe_concurrency: 4
"#;

pub fn config_from_yaml(layers: &[&str]) -> Result<ValidatorConfig> {
    load_layered_yaml_from_strings(layers)?.settings()
}

/// A fully wired in-memory harness.
pub struct Harness {
    pub source: Arc<MemoryStore>,
    pub target: Arc<MemoryStore>,
    pub factory: Arc<MemoryStoreFactory>,
    pub email: Arc<RecordingTransport>,
    pub topic: Arc<RecordingTransport>,
    pub reports: Arc<MemoryReportSink>,
}

impl Harness {
    pub fn new() -> Self {
        let source = Arc::new(MemoryStore::new("uat"));
        let target = Arc::new(MemoryStore::new("landing-uat"));
        Self {
            factory: Arc::new(MemoryStoreFactory::new(source.clone(), target.clone())),
            source,
            target,
            email: Arc::new(RecordingTransport::default()),
            topic: Arc::new(RecordingTransport::default()),
            reports: Arc::new(MemoryReportSink::default()),
        }
    }

    /// Controller over [`BASE_CONFIG`] plus `overlays`, with email then topic
    /// alerting and the fixed reference clock.
    pub fn controller(&self, overlays: &[&str]) -> Result<ModeController> {
        let mut layers = vec![BASE_CONFIG];
        layers.extend_from_slice(overlays);
        let config = config_from_yaml(&layers)?;

        let dispatcher = AlertDispatcher::new(Duration::from_secs(5))
            .with_channel(AlertChannel::Email {
                sender: self.email.clone(),
                recipients: vec!["ops@example.com".to_string()],
            })
            .with_channel(AlertChannel::Topic {
                publisher: self.topic.clone(),
                topic_arn: "arn:aws:sns:us-east-1:000000000000:sync-alerts".to_string(),
            });

        Ok(ModeController::new(config, self.factory.clone())
            .with_dispatcher(dispatcher)
            .with_report_sink(self.reports.clone())
            .with_clock(fixed_clock(reference_now())))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
