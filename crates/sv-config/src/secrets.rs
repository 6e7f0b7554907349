//! Source connection secret resolution.
//!
//! Precedence:
//! 1. `AZURE_CONNECTION_STRING` (or the configured `connection_env`) holding
//!    a raw connection string.
//! 2. The JSON secret payload for `secret_id`: from `secret_env` when that is
//!    configured, otherwise from AWS Secrets Manager ([`SecretsManagerProvider`]).
//!    The payload must be a JSON object carrying the connection string under
//!    `connection_string`, `AZURE_STORAGE_CONNECTION_STRING` or
//!    `connectionString` (first wins).
//!
//! Nothing here ever logs or formats a secret value.

mod aws;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::settings::SourceSettings;

pub use aws::SecretsManagerProvider;

/// Default override env var for a raw connection string.
pub const CONNECTION_OVERRIDE_ENV: &str = "AZURE_CONNECTION_STRING";

/// Keys searched in the secret payload, in order.
pub const PAYLOAD_KEYS: &[&str] = &[
    "connection_string",
    "AZURE_STORAGE_CONNECTION_STRING",
    "connectionString",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("SECRET_UNAVAILABLE: {0}")]
    Unavailable(String),
}

fn unavailable(msg: impl Into<String>) -> SecretError {
    SecretError::Unavailable(msg.into())
}

// ---------------------------------------------------------------------------
// Connection string
// ---------------------------------------------------------------------------

/// Parsed storage connection string. Only the fields the validator needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub sas: Option<String>,
    pub blob_endpoint: String,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<REDACTED>"))
            .field("sas", &self.sas.as_ref().map(|_| "<REDACTED>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl ConnectionString {
    /// Parse `Key=Value;Key=Value` pairs.
    ///
    /// The blob endpoint is `BlobEndpoint` when present, else derived from
    /// `DefaultEndpointsProtocol`, `AccountName` and `EndpointSuffix`. A string
    /// with neither an account key nor a SAS is rejected.
    pub fn parse(raw: &str) -> Result<Self, SecretError> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for part in raw.trim().split(';').filter(|p| !p.trim().is_empty()) {
            // Values (account keys, SAS) may contain '='; split on the first only.
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| unavailable("connection string segment without '='"))?;
            fields.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }

        let get = |k: &str| fields.get(k).filter(|v| !v.is_empty()).cloned();

        let account_name = get("accountname");
        let account_key = get("accountkey");
        let sas = get("sharedaccesssignature");
        if account_key.is_none() && sas.is_none() {
            return Err(unavailable(
                "connection string carries neither AccountKey nor SharedAccessSignature",
            ));
        }
        if account_key.is_some() && account_name.is_none() {
            return Err(unavailable("connection string has AccountKey without AccountName"));
        }

        let blob_endpoint = match get("blobendpoint") {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => {
                let account = account_name
                    .as_deref()
                    .ok_or_else(|| unavailable("connection string has no BlobEndpoint or AccountName"))?;
                let protocol = get("defaultendpointsprotocol").unwrap_or_else(|| "https".to_string());
                let suffix = get("endpointsuffix").unwrap_or_else(|| "core.windows.net".to_string());
                format!("{protocol}://{account}.blob.{suffix}")
            }
        };

        Ok(Self {
            account_name,
            account_key,
            sas,
            blob_endpoint,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Structured secret payload as returned by a [`SecretProvider`].
#[derive(Clone, PartialEq)]
pub struct ConnectionSecret {
    fields: serde_json::Map<String, Value>,
}

impl fmt::Debug for ConnectionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSecret")
            .field("keys", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ConnectionSecret {
    /// The connection string: first of [`PAYLOAD_KEYS`] present. A present
    /// key holding anything but a non-blank string fails closed.
    pub fn connection_string(&self) -> Result<&str, SecretError> {
        for key in PAYLOAD_KEYS {
            if let Some(found) = self.fields.get(*key) {
                return found
                    .as_str()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| unavailable(format!("secret payload key '{key}' is empty or not a string")));
            }
        }
        Err(unavailable(format!("secret payload has none of {PAYLOAD_KEYS:?}")))
    }
}

/// Strict JSON parse of a secret payload. Must be a JSON object.
pub fn parse_secret_payload(payload: &str) -> Result<ConnectionSecret, SecretError> {
    let v: Value = serde_json::from_str(payload)
        .map_err(|_| unavailable("secret payload is not valid JSON"))?;
    match v {
        Value::Object(fields) => Ok(ConnectionSecret { fields }),
        _ => Err(unavailable("secret payload is not a JSON object")),
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Where connection secrets come from.
#[async_trait::async_trait]
pub trait SecretProvider: Send + Sync {
    async fn get_connection_secret(&self, secret_id: &str) -> Result<ConnectionSecret, SecretError>;

    fn provider_type(&self) -> &'static str;
}

/// Provider for a deployment: the env payload when `source.secret_env` names
/// one, Secrets Manager when only `source.secret_id` is set. With neither,
/// only the connection override env var can supply the source connection.
pub fn provider_for(source: &SourceSettings, shared: &aws_config::SdkConfig) -> Arc<dyn SecretProvider> {
    match (&source.secret_env, &source.secret_id) {
        (Some(env), _) => Arc::new(EnvSecretProvider::new(Some(env.clone()))),
        (None, Some(_)) => Arc::new(SecretsManagerProvider::new(shared)),
        (None, None) => Arc::new(EnvSecretProvider::default()),
    }
}

/// Env var name derived from a secret id: `sync/uat-conn` -> `SV_SECRET_SYNC_UAT_CONN`.
pub fn derived_secret_env(secret_id: &str) -> String {
    let tail: String = secret_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("SV_SECRET_{tail}")
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads the JSON payload from an env var: the configured `payload_env`, or
/// the name derived from the secret id.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider {
    pub payload_env: Option<String>,
}

impl EnvSecretProvider {
    pub fn new(payload_env: Option<String>) -> Self {
        Self { payload_env }
    }

    fn fetch(&self, secret_id: &str, read: impl Fn(&str) -> Option<String>) -> Result<ConnectionSecret, SecretError> {
        let name = self
            .payload_env
            .clone()
            .unwrap_or_else(|| derived_secret_env(secret_id));
        let payload = read(&name).ok_or_else(|| {
            unavailable(format!("secret '{secret_id}' not found (env var {name} is not set)"))
        })?;
        parse_secret_payload(&payload)
    }
}

#[async_trait::async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_connection_secret(&self, secret_id: &str) -> Result<ConnectionSecret, SecretError> {
        self.fetch(secret_id, read_env)
    }

    fn provider_type(&self) -> &'static str {
        "env"
    }
}

/// Fixed secret, for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticSecretProvider(pub Result<ConnectionSecret, SecretError>);

impl StaticSecretProvider {
    /// Provider answering every id with `{"connection_string": <raw>}`.
    pub fn connection_string(raw: &str) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("connection_string".to_string(), Value::String(raw.to_string()));
        Self(Ok(ConnectionSecret { fields }))
    }
}

#[async_trait::async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_connection_secret(&self, _secret_id: &str) -> Result<ConnectionSecret, SecretError> {
        self.0.clone()
    }

    fn provider_type(&self) -> &'static str {
        "static"
    }
}

/// Source connection for a run.
///
/// The override env var (`source.connection_env`, default
/// [`CONNECTION_OVERRIDE_ENV`]) wins; otherwise `source.secret_id` is fetched
/// from `provider`.
pub async fn resolve_connection(
    source: &SourceSettings,
    provider: &dyn SecretProvider,
) -> Result<ConnectionString, SecretError> {
    resolve_connection_with(source, provider, read_env).await
}

async fn resolve_connection_with(
    source: &SourceSettings,
    provider: &dyn SecretProvider,
    read: impl Fn(&str) -> Option<String>,
) -> Result<ConnectionString, SecretError> {
    let override_env = source
        .connection_env
        .as_deref()
        .unwrap_or(CONNECTION_OVERRIDE_ENV);
    if let Some(raw) = read(override_env) {
        tracing::debug!(env = override_env, "using connection string override");
        return ConnectionString::parse(&raw);
    }

    let secret_id = source.secret_id.as_deref().ok_or_else(|| {
        unavailable(format!(
            "{override_env} is not set and no source.secret_id is configured"
        ))
    })?;
    let secret = provider.get_connection_secret(secret_id).await?;
    ConnectionString::parse(secret.connection_string()?)
}

/// Read an env var NAME, returning `None` when unset or blank.
pub fn resolve_env(name: Option<&str>) -> Option<String> {
    name.and_then(read_env)
}
