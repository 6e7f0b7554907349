//! Store handles for one run.
//!
//! Acquired once per run (after the expectation set is resolved) and dropped
//! when the run ends.

use std::sync::Arc;

use sv_config::secrets::{provider_for, resolve_connection, SecretProvider};
use sv_config::settings::SourceSettings;
use sv_config::{Locations, ValidatorConfig};
use sv_schemas::StoreSide;
use sv_store::azure::{AzureBlobContainer, BlobAuth};
use sv_store::s3::{client_config, S3Bucket};
use sv_store::{ObjectSink, ObjectStore};

use crate::RunError;

#[derive(Clone)]
pub struct RunStores {
    pub source: Arc<dyn ObjectStore>,
    pub target: Arc<dyn ObjectStore>,
    /// Report upload destination (the target bucket). `None` disables upload.
    pub report_sink: Option<Arc<dyn ObjectSink>>,
}

impl RunStores {
    pub fn side(&self, side: StoreSide) -> &dyn ObjectStore {
        match side {
            StoreSide::Source => self.source.as_ref(),
            StoreSide::Target => self.target.as_ref(),
        }
    }
}

/// Opens the store handles for a run.
#[async_trait::async_trait]
pub trait StoreFactory: Send + Sync {
    async fn open(&self, config: &ValidatorConfig, locations: &Locations) -> Result<RunStores, RunError>;
}

/// Real clients.
///
/// Source: connection string from the secret provider (or the override env
/// var). Target: the AWS SDK with the shared config's credential chain.
pub struct HttpStoreFactory {
    secrets: Arc<dyn SecretProvider>,
    aws: aws_config::SdkConfig,
}

impl HttpStoreFactory {
    pub fn new(secrets: Arc<dyn SecretProvider>, aws: aws_config::SdkConfig) -> Self {
        Self { secrets, aws }
    }

    /// Loads the AWS config from the environment and picks the secret
    /// provider for `source`.
    pub async fn from_env(source: &SourceSettings) -> Self {
        let aws = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let secrets = provider_for(source, &aws);
        tracing::info!(secret_provider = secrets.provider_type(), "store factory ready");
        Self::new(secrets, aws)
    }
}

#[async_trait::async_trait]
impl StoreFactory for HttpStoreFactory {
    async fn open(&self, config: &ValidatorConfig, locations: &Locations) -> Result<RunStores, RunError> {
        let conn = resolve_connection(&config.source, self.secrets.as_ref()).await?;

        let endpoint = config
            .source
            .account_url
            .clone()
            .unwrap_or_else(|| conn.blob_endpoint.clone());
        let blob_auth = match (conn.sas, conn.account_name, conn.account_key) {
            (Some(sas), _, _) => BlobAuth::Sas(sas),
            (None, Some(account), Some(key)) => BlobAuth::SharedKey { account, key },
            _ => BlobAuth::Anonymous,
        };
        let container = AzureBlobContainer::new(&endpoint, locations.container.clone(), blob_auth)
            .map_err(|e| RunError::Configuration(format!("source endpoint: {e}")))?;

        let bucket = S3Bucket::from_conf(
            client_config(&self.aws, config.target.region(), config.target.endpoint.as_deref()),
            locations.bucket.clone(),
        );

        tracing::debug!(
            container = %locations.container,
            bucket = %locations.bucket,
            "store clients ready"
        );

        let bucket = Arc::new(bucket);
        Ok(RunStores {
            source: Arc::new(container),
            target: bucket.clone(),
            report_sink: Some(bucket),
        })
    }
}
