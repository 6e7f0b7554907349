//! Pattern resolution: run configuration + reference instant -> expectations.
//!
//! Pure logic. The caller supplies the reference instant so the same inputs
//! always resolve to the same expectation set.
//!
//! # Date tokens
//!
//! | Token          | Example      | Used by                     |
//! |----------------|--------------|-----------------------------|
//! | `{YYYYMMDD}`   | `20250908`   | `indoor_users_` exports     |
//! | `{YYYY-MM-DD}` | `2025-09-08` | `Oracle/AABS-` archives     |
//!
//! Any other brace group is left untouched.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use sv_schemas::RunMode;

use crate::{ExpectationSet, ExpectationSpec};

/// Templates used when a run names neither files nor prefixes.
pub const DEFAULT_PREFIX_TEMPLATES: &[&str] =
    &["indoor_users_{YYYYMMDD}", "Oracle/AABS-{YYYY-MM-DD}"];

const COMPACT_DATE_TOKEN: &str = "{YYYYMMDD}";
const HYPHENATED_DATE_TOKEN: &str = "{YYYY-MM-DD}";

/// Inputs to [`resolve`].
#[derive(Clone, Debug)]
pub struct ResolveRequest<'a> {
    pub mode: RunMode,
    /// Exact object names. A non-empty list wins over prefixes.
    pub expected_files: Option<&'a [String]>,
    /// Prefix templates. `None` means [`DEFAULT_PREFIX_TEMPLATES`].
    pub prefixes: Option<&'a [String]>,
    /// Reference instant; its UTC date is substituted into templates.
    pub reference: DateTime<Utc>,
    /// Lookback window. `None` means the mode default; zero is clamped to one.
    pub lookback_days: Option<u32>,
}

/// Substitute the reference date into a prefix template.
pub fn instantiate_template(template: &str, date: NaiveDate) -> String {
    template
        .replace(COMPACT_DATE_TOKEN, &date.format("%Y%m%d").to_string())
        .replace(HYPHENATED_DATE_TOKEN, &date.format("%Y-%m-%d").to_string())
}

/// `true` when the template carries at least one date token.
pub fn is_date_stamped(template: &str) -> bool {
    template.contains(COMPACT_DATE_TOKEN) || template.contains(HYPHENATED_DATE_TOKEN)
}

/// Effective lookback window for a mode.
pub fn effective_lookback_days(mode: RunMode, requested: Option<u32>) -> u32 {
    requested.unwrap_or_else(|| mode.default_lookback_days()).max(1)
}

/// Resolve a run's configuration into its expectation set.
///
/// - Weekly: a single inventory directive over the lookback window.
/// - Daily with a non-empty `expected_files`: one exact expectation per
///   distinct name, in the given order.
/// - Daily otherwise: one must-match prefix expectation per template,
///   instantiated with the reference date, with a source-side
///   modified-after cutoff of `lookback_days` before the reference instant.
///
/// Never fails. Empty configuration resolves to an empty expectation list.
pub fn resolve(req: &ResolveRequest<'_>) -> ExpectationSet {
    let lookback_days = effective_lookback_days(req.mode, req.lookback_days);
    let cutoff = req.reference - Duration::days(i64::from(lookback_days));

    if req.mode == RunMode::Weekly {
        return ExpectationSet::Inventory {
            lookback_days,
            modified_after: cutoff,
        };
    }

    if let Some(files) = req.expected_files.filter(|f| !f.is_empty()) {
        return ExpectationSet::Specs {
            specs: distinct_trimmed(files)
                .into_iter()
                .map(ExpectationSpec::exact)
                .collect(),
            modified_after: None,
        };
    }

    let date = req.reference.date_naive();
    let templates: Vec<String> = match req.prefixes {
        Some(p) => distinct_trimmed(p),
        None => DEFAULT_PREFIX_TEMPLATES
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };

    let mut seen = BTreeSet::new();
    let specs = templates
        .iter()
        .map(|t| instantiate_template(t, date))
        .filter(|p| seen.insert(p.clone()))
        .map(ExpectationSpec::prefix)
        .collect();

    ExpectationSet::Specs {
        specs,
        modified_after: Some(cutoff),
    }
}

/// Trim, drop blanks and duplicates, keep first-seen order.
fn distinct_trimmed(items: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn req<'a>(mode: RunMode, reference: DateTime<Utc>) -> ResolveRequest<'a> {
        ResolveRequest {
            mode,
            expected_files: None,
            prefixes: None,
            reference,
            lookback_days: None,
        }
    }

    #[test]
    fn both_date_formats_are_substituted() {
        let d = NaiveDate::from_ymd_opt(2025, 9, 8).unwrap();
        assert_eq!(
            instantiate_template("indoor_users_{YYYYMMDD}", d),
            "indoor_users_20250908"
        );
        assert_eq!(
            instantiate_template("Oracle/AABS-{YYYY-MM-DD}", d),
            "Oracle/AABS-2025-09-08"
        );
        assert_eq!(instantiate_template("x/{HH}/", d), "x/{HH}/");
    }

    #[test]
    fn daily_defaults_to_two_canonical_prefixes_with_two_day_cutoff() {
        let now = at(2025, 9, 8, 14);
        let set = resolve(&req(RunMode::Daily, now));
        assert_eq!(
            set,
            ExpectationSet::Specs {
                specs: vec![
                    ExpectationSpec::prefix("indoor_users_20250908"),
                    ExpectationSpec::prefix("Oracle/AABS-2025-09-08"),
                ],
                modified_after: Some(at(2025, 9, 6, 14)),
            }
        );
    }

    #[test]
    fn expected_files_win_and_are_not_date_substituted() {
        let files = vec![
            "indoor_users_{YYYYMMDD}.txt".to_string(),
            " Oracle/AABS-2025-08-29.zip ".to_string(),
            "Oracle/AABS-2025-08-29.zip".to_string(),
        ];
        let mut r = req(RunMode::Daily, at(2025, 9, 8, 0));
        r.expected_files = Some(&files);

        let set = resolve(&r);
        assert_eq!(
            set.specs(),
            &[
                ExpectationSpec::exact("indoor_users_{YYYYMMDD}.txt"),
                ExpectationSpec::exact("Oracle/AABS-2025-08-29.zip"),
            ]
        );
        assert_eq!(set.modified_after(), None);
    }

    #[test]
    fn empty_expected_files_fall_back_to_prefixes() {
        let files: Vec<String> = vec![];
        let prefixes = vec!["Oracle/".to_string()];
        let mut r = req(RunMode::Daily, at(2025, 1, 1, 0));
        r.expected_files = Some(&files);
        r.prefixes = Some(&prefixes);

        assert_eq!(resolve(&r).specs(), &[ExpectationSpec::prefix("Oracle/")]);
    }

    #[test]
    fn empty_prefix_list_means_no_expectations() {
        let prefixes: Vec<String> = vec![];
        let mut r = req(RunMode::Daily, at(2025, 1, 1, 0));
        r.prefixes = Some(&prefixes);
        assert!(resolve(&r).specs().is_empty());
    }

    #[test]
    fn weekly_is_an_inventory_over_seven_days() {
        let now = at(2025, 9, 8, 6);
        let files = vec!["ignored.txt".to_string()];
        let mut r = req(RunMode::Weekly, now);
        r.expected_files = Some(&files);

        assert_eq!(
            resolve(&r),
            ExpectationSet::Inventory {
                lookback_days: 7,
                modified_after: at(2025, 9, 1, 6),
            }
        );
    }

    #[test]
    fn zero_lookback_is_clamped_to_one_day() {
        assert_eq!(effective_lookback_days(RunMode::Daily, Some(0)), 1);
        assert_eq!(effective_lookback_days(RunMode::Weekly, None), 7);
        assert_eq!(effective_lookback_days(RunMode::Daily, Some(5)), 5);
    }

    #[test]
    fn is_date_stamped_detects_either_token() {
        assert!(is_date_stamped("a_{YYYYMMDD}"));
        assert!(is_date_stamped("b-{YYYY-MM-DD}"));
        assert!(!is_date_stamped("Oracle/"));
    }
}
