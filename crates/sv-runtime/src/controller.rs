//! Mode Controller: drives one validation run end to end.
//!
//! `Start -> ResolvePatterns -> Normalize(source) || Normalize(target) ->
//! Reconcile -> Decide -> Terminal`
//!
//! Configuration, secret and auth failures abort the run (`Aborted`) and are
//! returned as [`RunError`]. Everything after `Decide` (alerting, report
//! writing) is best effort and cannot change the result.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sv_alert::{AlertDispatcher, DeliveryRecord};
use sv_artifacts::{LocalReportSink, ReportSink, ReportWriter, WrittenReport};
use sv_config::ValidatorConfig;
use sv_reconcile::{reconcile, resolve, ExpectationSet, ExpectationSpec, ResolveRequest, RunResult, SideObservations};
use sv_schemas::{ObjectInfo, RunMode, StoreSide};
use sv_store::{ListRequest, ListingError, Normalizer, ObjectStore, StoreError};
use uuid::Uuid;

use crate::phase::{PhaseTracker, RunPhase};
use crate::stores::StoreFactory;
use crate::{RunError, ValidationRequest};

/// Per-invocation switches that are not part of the request itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub alerts: bool,
    pub write_report: bool,
    pub upload_report: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            alerts: true,
            write_report: true,
            upload_report: true,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub result: RunResult,
    pub expectations: ExpectationSet,
    pub report: WrittenReport,
    /// `None` when no alert was due or alerts were disabled.
    pub delivery: Option<DeliveryRecord>,
}

impl RunOutcome {
    /// Non-zero completion status for the caller.
    pub fn is_fatal(&self) -> bool {
        self.result.fatal
    }
}

/// Clock used for `generated_at` and the reference date.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ModeController {
    config: ValidatorConfig,
    config_hash: Option<String>,
    stores: Arc<dyn StoreFactory>,
    dispatcher: AlertDispatcher,
    report_sink: Arc<dyn ReportSink>,
    clock: Clock,
}

/// Resolve the expectation set for a request without touching any store.
pub fn resolve_expectations(
    config: &ValidatorConfig,
    req: &ValidationRequest,
    now: DateTime<Utc>,
) -> Result<(RunMode, ExpectationSet), RunError> {
    let mode = req.run_mode()?;
    let prefixes = req.prefixes.as_deref().or(config.patterns.prefixes.as_deref());
    let set = resolve(&ResolveRequest {
        mode,
        expected_files: req.expected_files.as_deref(),
        prefixes,
        reference: req.reference(now),
        lookback_days: req.days,
    });
    Ok((mode, set))
}

impl ModeController {
    /// Alert chain and local report directory come from `config`.
    pub fn new(config: ValidatorConfig, stores: Arc<dyn StoreFactory>) -> Self {
        let timeout = config.runtime.call_timeout();
        let dispatcher = AlertDispatcher::from_settings(&config.alerts, timeout);
        let report_sink: Arc<dyn ReportSink> = Arc::new(LocalReportSink::new(config.report.local_dir()));
        Self {
            config,
            config_hash: None,
            stores,
            dispatcher,
            report_sink,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: AlertDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub async fn run(&self, req: &ValidationRequest, opts: RunOptions) -> Result<RunOutcome, RunError> {
        let mut phases = PhaseTracker::new();
        match self.run_phases(req, opts, &mut phases).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if !phases.current().is_terminal() {
                    phases.advance(RunPhase::Aborted)?;
                }
                tracing::error!(kind = e.kind(), error = %e, phase = %phases.current(), "run aborted");
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        req: &ValidationRequest,
        opts: RunOptions,
        phases: &mut PhaseTracker,
    ) -> Result<RunOutcome, RunError> {
        // Start: fail fast on anything that needs no store access.
        let mode = req.run_mode()?;
        self.config.validate()?;
        let locations = self.config.locations(req.environment.as_deref())?;
        let now = (self.clock)();
        tracing::info!(
            mode = %mode,
            container = %locations.container,
            bucket = %locations.bucket,
            "validation run started"
        );

        phases.advance(RunPhase::ResolvePatterns)?;
        let (_, expectations) = resolve_expectations(&self.config, req, now)?;

        phases.advance(RunPhase::Normalize)?;
        let stores = self.stores.open(&self.config, &locations).await?;
        let normalizer = Normalizer::new(self.config.runtime.call_timeout());
        let concurrency = self.config.runtime.probe_concurrency();
        let (source, target) = tokio::join!(
            observe_side(&normalizer, stores.side(StoreSide::Source), StoreSide::Source, &expectations, concurrency),
            observe_side(&normalizer, stores.side(StoreSide::Target), StoreSide::Target, &expectations, concurrency),
        );
        let (source, target) = (source?, target?);

        phases.advance(RunPhase::Reconcile)?;
        let reconciliation = reconcile(&expectations, &source, &target);

        phases.advance(RunPhase::Decide)?;
        let mut result = RunResult::assemble(
            Uuid::new_v4(),
            mode,
            locations.container.clone(),
            locations.bucket.clone(),
            reconciliation,
            now,
        );
        if let Some(h) = &self.config_hash {
            result = result.with_config_hash(h.clone());
        }
        tracing::info!(
            mode = %mode,
            checked = result.checked,
            discrepancies = result.discrepancies.len(),
            fatal = result.fatal,
            "validation run decided"
        );

        let alert_due = result.fatal || (mode == RunMode::Weekly && self.config.alerts.notify_weekly);
        let delivery = if opts.alerts && alert_due && !self.dispatcher.is_empty() {
            Some(self.dispatcher.dispatch(&result).await)
        } else {
            None
        };

        let report = if opts.write_report {
            let mut writer = ReportWriter::new(self.report_sink.clone(), self.config.report.prefix.clone());
            if opts.upload_report && self.config.report.upload {
                if let Some(sink) = &stores.report_sink {
                    writer = writer.with_uploader(sink.clone());
                }
            }
            writer.write(&result).await
        } else {
            WrittenReport::default()
        };

        phases.advance(RunPhase::Terminal)?;
        Ok(RunOutcome {
            result,
            expectations,
            report,
            delivery,
        })
    }
}

// ---------------------------------------------------------------------------
// Gathering
// ---------------------------------------------------------------------------

fn auth_error(side: StoreSide, message: String) -> RunError {
    RunError::Auth { side, message }
}

/// Everything one side reveals for the expectation set, fully materialized.
///
/// Prefix expectations are listed one prefix at a time; the modified-after
/// cutoff applies to the source only. Exact keys are probed through a bounded
/// pool, in expectation order. Auth failures abort; anything else is recorded.
async fn observe_side(
    normalizer: &Normalizer,
    store: &dyn ObjectStore,
    side: StoreSide,
    expectations: &ExpectationSet,
    concurrency: usize,
) -> Result<SideObservations, RunError> {
    let cutoff = match (side, expectations) {
        (_, ExpectationSet::Inventory { modified_after, .. }) => Some(*modified_after),
        (StoreSide::Source, ExpectationSet::Specs { modified_after, .. }) => *modified_after,
        (StoreSide::Target, ExpectationSet::Specs { .. }) => None,
    };

    let mut requests: Vec<ListRequest> = Vec::new();
    if expectations.is_inventory() {
        requests.push(ListRequest::all().modified_after(cutoff));
    }
    for spec in expectations.specs() {
        if let ExpectationSpec::Prefix { prefix, .. } = spec {
            requests.push(ListRequest::prefix(prefix.clone()).modified_after(cutoff));
        }
    }

    let mut obs = SideObservations::empty();
    for request in &requests {
        match normalizer.list(store, request).await {
            Ok(listing) => listing.into_iter().for_each(|o| obs.insert(o)),
            Err(ListingError::Auth(msg)) => return Err(auth_error(side, msg)),
            Err(ListingError::Transient(msg)) => {
                tracing::warn!(side = %side, location = store.location(), error = %msg, "listing failed");
                obs.listing_failure = Some(msg);
                break;
            }
        }
    }

    let keys = expectations.exact_keys();
    if !keys.is_empty() {
        let probes: Vec<(&str, Result<ObjectInfo, StoreError>)> = stream::iter(
            keys.into_iter()
                .map(|key| async move { (key, normalizer.probe(store, key).await) })
                .collect::<Vec<_>>(),
        )
            .buffered(concurrency)
            .collect()
            .await;

        for (key, probe) in probes {
            match probe {
                Ok(info) => obs.insert(info),
                Err(StoreError::Auth(msg)) => return Err(auth_error(side, msg)),
                Err(e) => {
                    tracing::warn!(side = %side, key, error = %e, "probe failed");
                    obs.record_failure(key, e.to_string());
                }
            }
        }
    }

    Ok(obs)
}
