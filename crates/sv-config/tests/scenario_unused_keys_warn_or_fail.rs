//! Unused config keys.
//!
//! GREEN when:
//! - A config using only known keys is clean.
//! - A misspelled key is reported with its JSON pointer.
//! - Warn returns the report; Fail errors with CONFIG_UNUSED_KEYS.

use sv_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const KNOWN_ONLY: &str = r#"
environment: uat
environments:
  uat: { container: uat, bucket: landing-uat }
source:
  secret_id: "sync/uat-conn"
report:
  prefix: "monitor-reports"
alerts:
  email:
    relay_url_env: "SV_MAIL_RELAY_URL"
    recipients: ["ops@example.com"]
runtime:
  call_timeout_secs: 10
"#;

const WITH_TYPO: &str = r#"
source:
  container: uat
target:
  buckett: landing-uat
reports:
  upload: false
"#;

#[test]
fn known_keys_are_clean() {
    let loaded = load_layered_yaml_from_strings(&[KNOWN_ONLY]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap();
    assert!(report.is_clean(), "unexpected: {:?}", report.unused_leaf_pointers);
}

#[test]
fn typos_are_reported_under_warn() {
    let loaded = load_layered_yaml_from_strings(&[WITH_TYPO]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/reports/upload".to_string(), "/target/buckett".to_string()]
    );
}

#[test]
fn typos_fail_under_fail_policy() {
    let loaded = load_layered_yaml_from_strings(&[WITH_TYPO]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "got: {msg}");
    assert!(msg.contains("/target/buckett"));
}
