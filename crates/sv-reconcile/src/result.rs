//! Terminal artifact of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sv_schemas::RunMode;
use uuid::Uuid;

use crate::gate::decide;
use crate::{Discrepancy, InventorySummary, Reconciliation};

/// `Time(UTC):` and report file-name timestamp format.
pub const COMPACT_TS_FORMAT: &str = "%Y%m%d%H%M%S";

/// Result of one invocation, handed to alerting and report writing.
///
/// Invariant: `fatal` implies `mode == Daily` and a non-empty
/// `discrepancies`. Only [`RunResult::assemble`] sets `fatal`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub mode: RunMode,
    /// `"ok"` or `"failed"`.
    pub status: String,
    /// Source container.
    pub source: String,
    /// Target bucket.
    pub target: String,
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
    #[serde(rename = "timestamp")]
    pub generated_at: DateTime<Utc>,
    pub fatal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventorySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl RunResult {
    pub fn assemble(
        run_id: Uuid,
        mode: RunMode,
        source: impl Into<String>,
        target: impl Into<String>,
        reconciliation: Reconciliation,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let verdict = decide(mode, &reconciliation);
        Self {
            run_id,
            mode,
            status: verdict.status().to_string(),
            source: source.into(),
            target: target.into(),
            checked: reconciliation.checked,
            discrepancies: reconciliation.discrepancies,
            generated_at,
            fatal: verdict.is_fatal(),
            inventory: reconciliation.inventory,
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    /// `ALL_OK` or `DISCREPANCIES_FOUND`.
    pub fn result_label(&self) -> &'static str {
        if self.discrepancies.is_empty() {
            "ALL_OK"
        } else {
            "DISCREPANCIES_FOUND"
        }
    }

    pub fn compact_timestamp(&self) -> String {
        self.generated_at.format(COMPACT_TS_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiscrepancyKind;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 8, 14, 9, 22).unwrap()
    }

    fn recon(findings: usize) -> Reconciliation {
        let mut r = Reconciliation::empty();
        for i in 0..findings {
            r.discrepancies
                .push(Discrepancy::new(DiscrepancyKind::MissingInTarget, format!("k{i}")));
        }
        r.checked = findings.max(1);
        r
    }

    #[test]
    fn daily_with_findings_is_fatal_and_failed() {
        let r = RunResult::assemble(Uuid::nil(), RunMode::Daily, "uat", "landing", recon(2), at());
        assert!(r.fatal);
        assert_eq!(r.status, "failed");
        assert_eq!(r.result_label(), "DISCREPANCIES_FOUND");
    }

    #[test]
    fn weekly_is_never_fatal() {
        let r = RunResult::assemble(Uuid::nil(), RunMode::Weekly, "uat", "landing", recon(3), at());
        assert!(!r.fatal);
        assert_eq!(r.status, "ok");
    }

    #[test]
    fn serialized_shape_carries_invocation_fields() {
        let r = RunResult::assemble(Uuid::nil(), RunMode::Daily, "uat", "landing", recon(0), at());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["mode"], "daily");
        assert_eq!(v["checked"], 1);
        assert_eq!(v["timestamp"], "2025-09-08T14:09:22Z");
        assert!(v.get("inventory").is_none());
        assert_eq!(r.compact_timestamp(), "20250908140922");
    }
}
