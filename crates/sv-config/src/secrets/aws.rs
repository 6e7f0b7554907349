//! Connection secret from AWS Secrets Manager.
//!
//! Credentials and region come from the shared SDK config (standard provider
//! chain). The secret value is the same JSON payload the env provider reads.

use aws_sdk_secretsmanager::config::http::HttpResponse;
use aws_sdk_secretsmanager::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;

use super::{parse_secret_payload, unavailable, ConnectionSecret, SecretError, SecretProvider};

#[derive(Debug, Clone)]
pub struct SecretsManagerProvider {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerProvider {
    pub fn new(shared: &aws_config::SdkConfig) -> Self {
        Self::from_conf(aws_sdk_secretsmanager::Config::from(shared))
    }

    pub fn from_conf(conf: aws_sdk_secretsmanager::Config) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::from_conf(conf),
        }
    }
}

fn lookup_failed(secret_id: &str, err: SdkError<GetSecretValueError, HttpResponse>) -> SecretError {
    let reason = match err.as_service_error() {
        Some(e) if e.is_resource_not_found_exception() => "not found".to_string(),
        Some(e) if e.code() == Some("AccessDeniedException") => "access denied".to_string(),
        _ => DisplayErrorContext(&err).to_string(),
    };
    unavailable(format!("secret '{secret_id}': {reason}"))
}

#[async_trait::async_trait]
impl SecretProvider for SecretsManagerProvider {
    async fn get_connection_secret(&self, secret_id: &str) -> Result<ConnectionSecret, SecretError> {
        let out = self
            .client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| lookup_failed(secret_id, e))?;

        let payload = match (out.secret_string(), out.secret_binary()) {
            (Some(s), _) => s.to_string(),
            (None, Some(b)) => String::from_utf8(b.clone().into_inner())
                .map_err(|_| unavailable(format!("secret '{secret_id}': binary value is not UTF-8")))?,
            (None, None) => {
                return Err(unavailable(format!(
                    "secret '{secret_id}' has neither SecretString nor SecretBinary"
                )))
            }
        };

        tracing::info!(
            secret_id,
            version = ?out.version_id(),
            "connection secret loaded from Secrets Manager"
        );
        parse_secret_payload(&payload)
    }

    fn provider_type(&self) -> &'static str {
        "secretsmanager"
    }
}
