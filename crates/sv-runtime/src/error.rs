use sv_config::secrets::SecretError;
use sv_config::ConfigError;
use sv_schemas::StoreSide;
use thiserror::Error;

use crate::phase::TransitionError;

/// Errors that abort a run before a result is published.
///
/// Per-key store failures, alert delivery failures and report upload
/// failures are never surfaced here; they are absorbed into the result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Unsupported mode, missing container/bucket, bad endpoint or schedule.
    #[error("CONFIG_INVALID: {0}")]
    Configuration(String),

    #[error("SECRET_UNAVAILABLE: {0}")]
    SecretUnavailable(String),

    /// A store refused the credentials.
    #[error("STORE_AUTH: {side}: {message}")]
    Auth { side: StoreSide, message: String },

    /// Controller bug: an illegal phase transition.
    #[error("RUN_INTERNAL: {0}")]
    Internal(String),
}

impl RunError {
    /// Stable label for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Configuration(_) => "configuration",
            RunError::SecretUnavailable(_) => "secret_unavailable",
            RunError::Auth { .. } => "auth",
            RunError::Internal(_) => "internal",
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Invalid(msg) => RunError::Configuration(msg),
        }
    }
}

impl From<SecretError> for RunError {
    fn from(e: SecretError) -> Self {
        match e {
            SecretError::Unavailable(msg) => RunError::SecretUnavailable(msg),
        }
    }
}

impl From<TransitionError> for RunError {
    fn from(e: TransitionError) -> Self {
        RunError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_a_single_stable_prefix() {
        let e = RunError::from(ConfigError::Invalid("target bucket is not configured".into()));
        assert_eq!(e.to_string(), "CONFIG_INVALID: target bucket is not configured");
        assert_eq!(e.kind(), "configuration");

        let e = RunError::from(SecretError::Unavailable("secret 'x' not found".into()));
        assert_eq!(e.to_string(), "SECRET_UNAVAILABLE: secret 'x' not found");

        let e = RunError::Auth {
            side: StoreSide::Target,
            message: "list objects: http 403".into(),
        };
        assert_eq!(e.to_string(), "STORE_AUTH: target: list objects: http 403");
    }
}
