//! Typed view of the merged configuration.
//!
//! Every section is optional in YAML; defaults apply per field. Effective
//! store locations are resolved by [`ValidatorConfig::locations`], which is
//! the only place a missing container or bucket is reported.

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_REPORT_PREFIX: &str = "monitor-reports";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

/// Semantic configuration failure. Raised before any store is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CONFIG_INVALID: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Name of the entry in `environments` to apply.
    pub environment: Option<String>,
    pub environments: BTreeMap<String, EnvironmentEntry>,
    pub source: SourceSettings,
    pub target: TargetSettings,
    pub patterns: PatternSettings,
    pub report: ReportSettings,
    pub alerts: AlertSettings,
    pub runtime: RuntimeSettings,
    pub schedule: ScheduleSettings,
}

/// One named deployment: which container is copied into which bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentEntry {
    pub container: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Blob endpoint override. When unset, taken from the connection string.
    pub account_url: Option<String>,
    pub container: Option<String>,
    /// Identifier of the connection secret.
    pub secret_id: Option<String>,
    /// Env var NAME holding the secret payload (JSON).
    pub secret_env: Option<String>,
    /// Env var NAME holding a raw connection string; wins over the secret.
    pub connection_env: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// S3-compatible endpoint (path-style). When unset, the regional endpoint is used.
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
}

impl TargetSettings {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    /// Prefix templates. `None` means the built-in defaults; an empty list
    /// means no expectations.
    pub prefixes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Directory for local report files. Defaults to the system temp dir.
    pub local_dir: Option<PathBuf>,
    /// Key prefix for uploaded reports.
    pub prefix: String,
    pub upload: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            local_dir: None,
            prefix: DEFAULT_REPORT_PREFIX.to_string(),
            upload: true,
        }
    }
}

impl ReportSettings {
    pub fn local_dir(&self) -> PathBuf {
        self.local_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Send the weekly inventory summary even though it never fails.
    pub notify_weekly: bool,
    pub email: Option<EmailChannelSettings>,
    pub topic: Option<TopicChannelSettings>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            notify_weekly: true,
            email: None,
            topic: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailChannelSettings {
    /// Env var NAME holding the mail relay URL.
    pub relay_url_env: Option<String>,
    pub sender: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicChannelSettings {
    /// Env var NAME holding the topic bridge URL.
    pub relay_url_env: Option<String>,
    pub topic_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub call_timeout_secs: u64,
    pub probe_concurrency: usize,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }
}

impl RuntimeSettings {
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs.max(1))
    }

    pub fn probe_concurrency(&self) -> usize {
        self.probe_concurrency.max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// UTC `HH:MM` for the daily run.
    pub daily_at: Option<String>,
    /// Day name for the weekly run (`mon`, `monday`, ...).
    pub weekly_on: Option<String>,
    /// UTC `HH:MM` for the weekly run. Defaults to `daily_at`, then 00:00.
    pub weekly_at: Option<String>,
}

fn parse_hhmm(field: &str, s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| invalid(format!("schedule.{field} '{s}' is not HH:MM")))
}

impl ScheduleSettings {
    pub fn daily_time(&self) -> Result<Option<NaiveTime>, ConfigError> {
        self.daily_at
            .as_deref()
            .map(|s| parse_hhmm("daily_at", s))
            .transpose()
    }

    /// `(weekday, time)` when a weekly run is scheduled.
    pub fn weekly(&self) -> Result<Option<(Weekday, NaiveTime)>, ConfigError> {
        let Some(day) = self.weekly_on.as_deref() else {
            return Ok(None);
        };
        let weekday: Weekday = day
            .trim()
            .parse()
            .map_err(|_| invalid(format!("schedule.weekly_on '{day}' is not a weekday")))?;
        let time = match (&self.weekly_at, &self.daily_at) {
            (Some(s), _) => parse_hhmm("weekly_at", s)?,
            (None, Some(s)) => parse_hhmm("daily_at", s)?,
            (None, None) => NaiveTime::MIN,
        };
        Ok(Some((weekday, time)))
    }
}

/// Effective container and bucket for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locations {
    pub environment: Option<String>,
    pub container: String,
    pub bucket: String,
}

impl ValidatorConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: config does not match the validator schema")
    }

    /// Resolve container and bucket, applying the selected environment.
    ///
    /// `environment_override` (e.g. from an invocation request) wins over the
    /// configured `environment`.
    pub fn locations(&self, environment_override: Option<&str>) -> Result<Locations, ConfigError> {
        let selected = environment_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(self.environment.as_deref());

        let entry = match selected {
            Some(name) => Some(self.environments.get(name).ok_or_else(|| {
                invalid(format!(
                    "unknown environment '{name}'; configured: {:?}",
                    self.environments.keys().collect::<Vec<_>>()
                ))
            })?),
            None => None,
        };

        let pick = |from_env: Option<&String>, base: &Option<String>| {
            from_env
                .or(base.as_ref())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let container = pick(entry.and_then(|e| e.container.as_ref()), &self.source.container)
            .ok_or_else(|| invalid("source container is not configured"))?;
        let bucket = pick(entry.and_then(|e| e.bucket.as_ref()), &self.target.bucket)
            .ok_or_else(|| invalid("target bucket is not configured"))?;

        Ok(Locations {
            environment: selected.map(str::to_string),
            container,
            bucket,
        })
    }

    /// Checks that need no store access. Run before anything else.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule.daily_time()?;
        self.schedule.weekly()?;
        if let Some(email) = &self.alerts.email {
            if email.recipients.iter().all(|r| r.trim().is_empty()) {
                return Err(invalid("alerts.email requires at least one recipient"));
            }
        }
        if let Some(topic) = &self.alerts.topic {
            if topic.topic_arn.as_deref().map_or(true, |a| a.trim().is_empty()) {
                return Err(invalid("alerts.topic requires topic_arn"));
            }
        }
        Ok(())
    }
}
