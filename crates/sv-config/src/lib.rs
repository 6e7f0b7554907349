//! sv-config
//!
//! Layered YAML configuration for the sync validator.
//!
//! - Documents are merged left to right (later layers override earlier ones),
//!   converted to JSON, and hashed (SHA-256 of the canonical JSON) so every
//!   result can name the exact configuration that produced it.
//! - Config files hold env var NAMES for credentials, never values. A leaf that
//!   looks like a credential aborts loading with `CONFIG_SECRET_DETECTED`.
//! - [`report_unused_keys`] flags leaves the validator never reads.
//! - [`settings::ValidatorConfig`] is the typed view consumed by the runtime.
//! - [`secrets`] resolves the source connection secret at run time.

pub mod secrets;
pub mod settings;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

pub use settings::{ConfigError, Locations, ValidatorConfig};

/// Leaf string values starting with any of these abort loading.
const SECRET_PREFIXES: &[&str] = &[
    "AKIA",                     // AWS access key id
    "ASIA",                     // AWS temporary access key id
    "-----BEGIN",               // PEM private keys
    "DefaultEndpointsProtocol=", // storage account connection string
    "BlobEndpoint=",
    "AccountKey=",
    "SharedAccessSignature=",
    "sk-",
    "ghp_",
    "xoxb-",
];

/// Substrings that mark a SAS token or connection string anywhere in a value.
const SECRET_MARKERS: &[&str] = &["AccountKey=", "&sig=", "?sig=", "SharedAccessSignature="];

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Consumed JSON-pointer prefixes used for this analysis (sorted, unique).
    pub consumed_prefixes: Vec<String>,
    /// Unused leaf pointers (sorted).
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON-pointer prefixes the validator reads. A leaf under any of them is
/// consumed. Keep in step with [`settings::ValidatorConfig`].
pub const CONSUMED_POINTERS: &[&str] = &[
    "/environment",
    "/environments",
    "/source/account_url",
    "/source/container",
    "/source/secret_id",
    "/source/secret_env",
    "/source/connection_env",
    "/target/endpoint",
    "/target/bucket",
    "/target/region",
    "/patterns/prefixes",
    "/report/local_dir",
    "/report/prefix",
    "/report/upload",
    "/alerts/notify_weekly",
    "/alerts/email",
    "/alerts/topic",
    "/runtime/call_timeout_secs",
    "/runtime/probe_concurrency",
    "/schedule/daily_at",
    "/schedule/weekly_on",
    "/schedule/weekly_at",
];

/// Report leaves not covered by [`CONSUMED_POINTERS`].
///
/// With `UnusedKeyPolicy::Fail` a non-clean report is an error; with `Warn`
/// the report is always returned.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS.iter().map(|p| normalize_pointer(p)).collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s). Remove them or fix the spelling. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }
    if !report.is_clean() {
        tracing::warn!(
            count = report.unused_leaf_pointers.len(),
            keys = %preview_list(&report.unused_leaf_pointers, 12),
            "unused config keys"
        );
    }

    Ok(report)
}

fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map {
                collect_leaf_pointers(vv, &format!("{prefix}/{}", escape_pointer_token(k)), out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged document.
    pub fn settings(&self) -> Result<ValidatorConfig> {
        ValidatorConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::with_capacity(paths.len());
    for p in paths {
        let p = p.as_ref();
        docs.push(
            fs::read_to_string(p)
                .with_context(|| format!("failed to read config layer: {}", p.display()))?,
        );
    }
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {i}"))?;
        // An empty document is an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json's default map is ordered by key, so serialization is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut a), Value::Object(b)) => {
            for (k, b_val) in b {
                let a_val = a.remove(&k).unwrap_or(Value::Null);
                a.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a)
        }
        (_, other) => other,
    }
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={ptr} value=REDACTED");
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p)) || SECRET_MARKERS.iter().any(|m| t.contains(m))
}
