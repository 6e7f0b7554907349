//! Command handlers for the `sv` binary.
//!
//! Shared request/config plumbing lives here; each subcommand has its own
//! module.

pub mod resolve;
pub mod validate;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use sv_config::{load_layered_yaml, report_unused_keys, LoadedConfig, UnusedKeyPolicy, ValidatorConfig};
use sv_runtime::ValidationRequest;

use crate::RequestArgs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Merge the config layers. No layers yields an empty document.
pub fn load_config(paths: &[String]) -> Result<(Option<LoadedConfig>, ValidatorConfig)> {
    if paths.is_empty() {
        return Ok((None, ValidatorConfig::default()));
    }
    let loaded = load_layered_yaml(paths)?;
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let settings = loaded.settings()?;
    Ok((Some(loaded), settings))
}

/// Event file first, then command-line flags on top.
pub fn build_request(args: &RequestArgs) -> Result<ValidationRequest> {
    let mut req = match &args.event {
        Some(path) => load_event(path)?,
        None => ValidationRequest::default(),
    };

    if args.mode.is_some() {
        req.mode = args.mode.clone();
    }
    if args.days.is_some() {
        req.days = args.days;
    }
    if !args.prefixes.is_empty() {
        req.prefixes = Some(args.prefixes.clone());
    }

    let files: Vec<String> = args
        .expected_file
        .iter()
        .chain(args.expected_files.iter())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !files.is_empty() {
        req.expected_files = Some(files);
    }

    if let Some(d) = &args.date {
        let date = NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
            .with_context(|| format!("CONFIG_INVALID: --date '{d}' is not YYYY-MM-DD"))?;
        req.date = Some(date);
    }

    Ok(req)
}

fn load_event(path: &str) -> Result<ValidationRequest> {
    let bytes = fs::read(path).with_context(|| format!("read event file failed: {path}"))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    serde_json::from_slice(bytes).with_context(|| format!("event file must be a JSON request object: {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_event_and_comma_files_merge() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, r#"{"mode":"weekly","days":3,"prefixes":["Oracle/"]}"#).unwrap();

        let args = RequestArgs {
            mode: Some("daily".into()),
            event: Some(path.to_string_lossy().into_owned()),
            expected_file: vec!["a.txt".into()],
            expected_files: vec!["b.txt".into(), " ".into()],
            ..RequestArgs::default()
        };
        let req = build_request(&args).unwrap();
        assert_eq!(req.mode.as_deref(), Some("daily"));
        assert_eq!(req.days, Some(3));
        assert_eq!(req.prefixes, Some(vec!["Oracle/".to_string()]));
        assert_eq!(req.expected_files, Some(vec!["a.txt".to_string(), "b.txt".to_string()]));
    }

    #[test]
    fn bad_date_is_a_configuration_error() {
        let args = RequestArgs {
            date: Some("01/01/2025".into()),
            ..RequestArgs::default()
        };
        let err = build_request(&args).unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"));
    }
}
