//! Run verdict gate.
//!
//! Turns a reconciliation into the verdict the caller acts on:
//!
//! - **Daily**: any discrepancy is fatal. The calling pipeline must treat a
//!   [`RunVerdict::Fatal`] as a hard stop and report non-zero completion.
//! - **Weekly**: never fatal. Discrepancies (there are none for inventory
//!   runs) are informational only.
//!
//! Pure and deterministic: no IO, no clock.

use sv_schemas::RunMode;

use crate::Reconciliation;

/// Outcome of the `Decide` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunVerdict {
    /// Daily run with no discrepancies.
    Clean,
    /// Daily run with at least one discrepancy.
    Fatal { discrepancies: usize },
    /// Weekly run. Completion status is success regardless of content.
    Informational,
}

impl RunVerdict {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunVerdict::Fatal { .. })
    }

    /// Stable label used by the result `status` field.
    pub fn status(&self) -> &'static str {
        if self.is_fatal() {
            "failed"
        } else {
            "ok"
        }
    }
}

/// `Decide`: fatal iff daily and the discrepancy list is non-empty.
pub fn decide(mode: RunMode, reconciliation: &Reconciliation) -> RunVerdict {
    match mode {
        RunMode::Weekly => RunVerdict::Informational,
        RunMode::Daily if reconciliation.is_clean() => RunVerdict::Clean,
        RunMode::Daily => RunVerdict::Fatal {
            discrepancies: reconciliation.discrepancies.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Discrepancy, DiscrepancyKind};

    fn with_findings(n: usize) -> Reconciliation {
        let mut r = Reconciliation::empty();
        for i in 0..n {
            r.discrepancies
                .push(Discrepancy::new(DiscrepancyKind::MissingInTarget, format!("k{i}")));
        }
        r
    }

    #[test]
    fn daily_is_fatal_iff_discrepancies_exist() {
        assert_eq!(decide(RunMode::Daily, &with_findings(0)), RunVerdict::Clean);
        assert_eq!(
            decide(RunMode::Daily, &with_findings(3)),
            RunVerdict::Fatal { discrepancies: 3 }
        );
    }

    #[test]
    fn weekly_is_never_fatal() {
        for n in [0, 1, 10] {
            let v = decide(RunMode::Weekly, &with_findings(n));
            assert!(!v.is_fatal());
            assert_eq!(v.status(), "ok");
        }
    }
}
