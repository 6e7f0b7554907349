use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sv_schemas::RunMode;

use crate::RunError;

/// Structured invocation request (CLI event file, daemon body, scheduler).
///
/// Every field is optional. `mode` defaults to daily; `prefixes` defaults to
/// the configured templates; a non-empty `expected_files` replaces prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRequest {
    pub mode: Option<String>,
    pub days: Option<u32>,
    pub prefixes: Option<Vec<String>>,
    pub expected_files: Option<Vec<String>>,
    /// Named environment overriding the configured one.
    pub environment: Option<String>,
    /// Reference date for date-stamped templates. Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

impl ValidationRequest {
    pub fn for_mode(mode: RunMode) -> Self {
        Self {
            mode: Some(mode.as_str().to_string()),
            ..Self::default()
        }
    }

    /// Unsupported modes are rejected here, before any other work.
    pub fn run_mode(&self) -> Result<RunMode, RunError> {
        match self.mode.as_deref() {
            None => Ok(RunMode::Daily),
            Some(m) => RunMode::parse(m)
                .ok_or_else(|| RunError::Configuration(format!("unsupported mode '{m}' (expected daily or weekly)"))),
        }
    }

    /// Reference instant: `date` at the time of day of `now`, else `now`.
    pub fn reference(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.date {
            Some(d) => d.and_time(now.time()).and_utc(),
            None => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mode_defaults_to_daily_and_rejects_unknown() {
        assert_eq!(ValidationRequest::default().run_mode().unwrap(), RunMode::Daily);
        let req = ValidationRequest {
            mode: Some("hourly".into()),
            ..Default::default()
        };
        assert!(matches!(req.run_mode(), Err(RunError::Configuration(_))));
    }

    #[test]
    fn event_json_uses_snake_case_fields() {
        let req: ValidationRequest = serde_json::from_str(
            r#"{"mode": "weekly", "days": 3, "expected_files": ["a.txt"], "date": "2025-01-01"}"#,
        )
        .unwrap();
        assert_eq!(req.run_mode().unwrap(), RunMode::Weekly);
        assert_eq!(req.days, Some(3));
        assert_eq!(req.expected_files.as_deref(), Some(&["a.txt".to_string()][..]));

        let now = Utc.with_ymd_and_hms(2025, 9, 8, 14, 9, 22).unwrap();
        assert_eq!(
            req.reference(now),
            Utc.with_ymd_and_hms(2025, 1, 1, 14, 9, 22).unwrap()
        );
    }
}
