use std::collections::BTreeSet;

use sv_schemas::ObjectInfo;

use crate::{
    Discrepancy, DiscrepancyKind, ExpectationSet, ExpectationSpec, InventorySummary, Lookup,
    Reconciliation, SideInventory, SideObservations,
};

/// Running state for one reconciliation pass.
struct Pass {
    discrepancies: Vec<Discrepancy>,
    evaluated: Vec<String>,
    seen: BTreeSet<String>,
}

impl Pass {
    fn new() -> Self {
        Self {
            discrepancies: Vec::new(),
            evaluated: Vec::new(),
            seen: BTreeSet::new(),
        }
    }

    /// Marks `key` as evaluated. Returns `false` if it already was.
    fn claim(&mut self, key: &str) -> bool {
        if !self.seen.insert(key.to_string()) {
            return false;
        }
        self.evaluated.push(key.to_string());
        true
    }

    fn push(&mut self, d: Discrepancy) {
        self.discrepancies.push(d);
    }

    fn finish(self) -> Reconciliation {
        Reconciliation {
            checked: self.evaluated.len(),
            discrepancies: self.discrepancies,
            evaluated: self.evaluated,
            inventory: None,
        }
    }
}

fn transient(key: &str, source_err: Option<&str>, target_err: Option<&str>) -> Discrepancy {
    let (side, error) = match (source_err, target_err) {
        (Some(s), Some(t)) => ("source,target", format!("source: {s}; target: {t}")),
        (Some(s), None) => ("source", s.to_string()),
        (None, Some(t)) => ("target", t.to_string()),
        (None, None) => ("unknown", "unspecified failure".to_string()),
    };
    Discrepancy::new(DiscrepancyKind::TransientError, key)
        .with("side", side)
        .with("error", error)
}

/// Size/zero/missing rules for a key known to be present in the source.
fn compare_present(key: &str, src: &ObjectInfo, target: Lookup<'_>, pass: &mut Pass) {
    if let Lookup::Failed(err) = target {
        pass.push(transient(key, None, Some(err)));
        return;
    }

    // Absent sizes never reach a numeric comparison.
    let Some(src_size) = src.size else {
        return;
    };

    if src_size == 0 {
        pass.push(Discrepancy::new(DiscrepancyKind::ZeroSizeInSource, key).with("source_size", 0));
    }

    match target {
        Lookup::Present(tgt) => {
            let Some(tgt_size) = tgt.size else {
                return;
            };
            if tgt_size == 0 {
                pass.push(
                    Discrepancy::new(DiscrepancyKind::ZeroSizeInTarget, key)
                        .with("source_size", src_size)
                        .with("target_size", 0),
                );
            }
            if src_size != tgt_size {
                pass.push(
                    Discrepancy::new(DiscrepancyKind::SizeMismatch, key)
                        .with("source_size", src_size)
                        .with("target_size", tgt_size),
                );
            }
        }
        Lookup::Absent => {
            pass.push(
                Discrepancy::new(DiscrepancyKind::MissingInTarget, key)
                    .with("source_size", src_size),
            );
        }
        Lookup::Failed(_) => {}
    }
}

fn evaluate_exact(key: &str, source: &SideObservations, target: &SideObservations, pass: &mut Pass) {
    if !pass.claim(key) {
        return;
    }

    let src = source.lookup(key);
    let tgt = target.lookup(key);

    // A failed probe on either side means nothing else about this key is trusted.
    match (&src, &tgt) {
        (Lookup::Failed(s), Lookup::Failed(t)) => {
            pass.push(transient(key, Some(*s), Some(*t)));
            return;
        }
        (Lookup::Failed(s), _) => {
            pass.push(transient(key, Some(*s), None));
            return;
        }
        (_, Lookup::Failed(t)) => {
            pass.push(transient(key, None, Some(*t)));
            return;
        }
        _ => {}
    }

    match src {
        Lookup::Present(obj) => compare_present(key, obj, tgt, pass),
        // The source is authoritative: nothing to compare the target against.
        Lookup::Absent => {
            let mut d = Discrepancy::new(DiscrepancyKind::MissingInSource, key);
            if let Lookup::Present(t) = tgt {
                if let Some(size) = t.size {
                    d = d.with("target_size", size);
                }
            }
            pass.push(d);
        }
        Lookup::Failed(_) => {}
    }
}

fn evaluate_prefix(
    prefix: &str,
    must_match: bool,
    source: &SideObservations,
    target: &SideObservations,
    pass: &mut Pass,
) {
    if let Some(err) = &source.listing_failure {
        if pass.claim(prefix) {
            pass.push(transient(prefix, Some(err.as_str()), None).with("prefix", prefix));
        }
        return;
    }

    let matches: Vec<&ObjectInfo> = source.present_with_prefix(prefix).collect();
    if matches.is_empty() {
        if must_match && pass.claim(prefix) {
            pass.push(Discrepancy::new(DiscrepancyKind::MissingInSource, prefix).with("prefix", prefix));
        }
        return;
    }

    // Every match is evaluated on its own; one prefix can yield many discrepancies.
    for obj in matches {
        if !pass.claim(&obj.name) {
            continue;
        }
        compare_present(&obj.name, obj, target.lookup(&obj.name), pass);
    }
}

fn inventory(
    lookback_days: u32,
    modified_after: chrono::DateTime<chrono::Utc>,
    source: &SideObservations,
    target: &SideObservations,
) -> Reconciliation {
    let src_names: BTreeSet<&str> = source.present().map(|o| o.name.as_str()).collect();
    let tgt_names: BTreeSet<&str> = target.present().map(|o| o.name.as_str()).collect();

    let union: Vec<String> = src_names
        .union(&tgt_names)
        .map(|s| s.to_string())
        .collect();

    let summary = InventorySummary {
        lookback_days,
        modified_after,
        union_count: union.len(),
        source_only: src_names.difference(&tgt_names).count(),
        target_only: tgt_names.difference(&src_names).count(),
        source: SideInventory::from_observations(source),
        target: SideInventory::from_observations(target),
    };

    Reconciliation {
        checked: union.len(),
        discrepancies: Vec::new(),
        evaluated: union,
        inventory: Some(summary),
    }
}

/// Deterministic reconciliation of fully materialized observations.
///
/// - Exact keys: source absent => MissingInSource (no target check); source
///   present => zero-size checks, then MissingInTarget or SizeMismatch.
/// - Prefixes: every source match is checked like an exact key; no source
///   match at all => MissingInSource for the prefix when it must match.
/// - Inventory: no classification, both listings returned as information.
/// - A failed probe or listing becomes a TransientError for the affected key
///   and never stops evaluation of the remaining expectations.
///
/// Given identical inputs the output is identical, order included.
pub fn reconcile(
    expectations: &ExpectationSet,
    source: &SideObservations,
    target: &SideObservations,
) -> Reconciliation {
    match expectations {
        ExpectationSet::Inventory {
            lookback_days,
            modified_after,
        } => inventory(*lookback_days, *modified_after, source, target),
        ExpectationSet::Specs { specs, .. } => {
            let mut pass = Pass::new();
            for spec in specs {
                match spec {
                    ExpectationSpec::Exact { key } => evaluate_exact(key, source, target, &mut pass),
                    ExpectationSpec::Prefix {
                        prefix,
                        must_match_at_least_one,
                    } => evaluate_prefix(prefix, *must_match_at_least_one, source, target, &mut pass),
                }
            }
            pass.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(specs: Vec<ExpectationSpec>) -> ExpectationSet {
        ExpectationSet::Specs {
            specs,
            modified_after: None,
        }
    }

    #[test]
    fn zero_in_source_and_absent_in_target_never_compares_sizes() {
        let source = SideObservations::from_listing([ObjectInfo::present("a.txt", 0, None)]);
        let target = SideObservations::from_listing([ObjectInfo::absent("a.txt")]);

        let r = reconcile(&specs(vec![ExpectationSpec::exact("a.txt")]), &source, &target);

        assert_eq!(r.count_of(DiscrepancyKind::ZeroSizeInSource), 1);
        assert_eq!(r.count_of(DiscrepancyKind::SizeMismatch), 0);
        assert_eq!(r.count_of(DiscrepancyKind::MissingInTarget), 1);
        assert_eq!(r.checked, 1);
    }

    #[test]
    fn zero_on_both_sides_is_two_zero_findings_and_no_mismatch() {
        let source = SideObservations::from_listing([ObjectInfo::present("z", 0, None)]);
        let target = SideObservations::from_listing([ObjectInfo::present("z", 0, None)]);

        let r = reconcile(&specs(vec![ExpectationSpec::exact("z")]), &source, &target);
        let kinds: Vec<_> = r.discrepancies.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DiscrepancyKind::ZeroSizeInSource, DiscrepancyKind::ZeroSizeInTarget]
        );
    }

    #[test]
    fn absent_in_both_reports_only_missing_in_source() {
        let r = reconcile(
            &specs(vec![ExpectationSpec::exact("ghost.txt")]),
            &SideObservations::empty(),
            &SideObservations::empty(),
        );
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].kind, DiscrepancyKind::MissingInSource);
        assert!(r.discrepancies[0].detail.is_empty());
    }

    #[test]
    fn target_only_exact_key_is_missing_in_source_with_target_size() {
        let target = SideObservations::from_listing([ObjectInfo::present("t.txt", 9, None)]);
        let r = reconcile(
            &specs(vec![ExpectationSpec::exact("t.txt")]),
            &SideObservations::empty(),
            &target,
        );
        assert_eq!(r.discrepancies[0].kind, DiscrepancyKind::MissingInSource);
        assert_eq!(r.discrepancies[0].detail["target_size"], "9");
    }

    #[test]
    fn failed_source_probe_suppresses_other_findings_for_that_key() {
        let mut source = SideObservations::empty();
        source.record_failure("k", "timeout");
        let target = SideObservations::from_listing([ObjectInfo::present("k", 0, None)]);

        let r = reconcile(&specs(vec![ExpectationSpec::exact("k")]), &source, &target);
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].kind, DiscrepancyKind::TransientError);
        assert_eq!(r.discrepancies[0].detail["side"], "source");
    }

    #[test]
    fn both_sides_failing_is_one_transient_naming_both() {
        let mut source = SideObservations::empty();
        source.record_failure("k", "s-down");
        let mut target = SideObservations::empty();
        target.record_failure("k", "t-down");

        let r = reconcile(&specs(vec![ExpectationSpec::exact("k")]), &source, &target);
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].detail["side"], "source,target");
    }

    #[test]
    fn optional_prefix_without_matches_is_not_checked() {
        let r = reconcile(
            &specs(vec![ExpectationSpec::optional_prefix("nothing/")]),
            &SideObservations::empty(),
            &SideObservations::empty(),
        );
        assert_eq!(r.checked, 0);
        assert!(r.is_clean());
    }

    #[test]
    fn overlapping_prefixes_evaluate_each_key_once() {
        let source = SideObservations::from_listing([
            ObjectInfo::present("Oracle/a.zip", 5, None),
            ObjectInfo::present("Oracle/b.zip", 5, None),
        ]);
        let target = SideObservations::from_listing([ObjectInfo::present("Oracle/a.zip", 5, None)]);

        let r = reconcile(
            &specs(vec![
                ExpectationSpec::prefix("Oracle/"),
                ExpectationSpec::prefix("Oracle/b"),
            ]),
            &source,
            &target,
        );
        assert_eq!(r.checked, 2);
        assert_eq!(r.discrepancies.len(), 1);
        assert_eq!(r.discrepancies[0].key, "Oracle/b.zip");
    }

    #[test]
    fn prefix_does_not_match_neighbouring_names() {
        let source = SideObservations::from_listing([
            ObjectInfo::present("Orac", 1, None),
            ObjectInfo::present("Oracle/x", 1, None),
            ObjectInfo::present("Oraclf", 1, None),
        ]);
        let names: Vec<_> = source
            .present_with_prefix("Oracle/")
            .map(|o| o.name.clone())
            .collect();
        assert_eq!(names, vec!["Oracle/x".to_string()]);
    }

    #[test]
    fn render_line_lists_detail_fields_in_name_order() {
        let d = Discrepancy::new(DiscrepancyKind::SizeMismatch, "r.txt")
            .with("target_size", 480)
            .with("source_size", 500);
        assert_eq!(
            d.render_line(),
            "SIZE_MISMATCH: r.txt | source_size=500 | target_size=480"
        );
    }
}
