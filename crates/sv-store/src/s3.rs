//! Bucket client (target side) on the AWS SDK.
//!
//! Calls used: `ListObjectsV2`, `HeadObject` and `PutObject` (report upload).
//! Credentials come from the shared SDK config, so the standard provider
//! chain applies: env keys, profile, container credentials, instance role.
//! A configured endpoint switches to path-style addressing for
//! S3-compatible gateways.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::{ListPage, ObjectProps, ObjectSink, ObjectStore, RawEntry, StoreError};

/// Client config for the target bucket, derived from the process-wide SDK
/// config. `endpoint` overrides the regional endpoint.
pub fn client_config(
    shared: &aws_config::SdkConfig,
    region: &str,
    endpoint: Option<&str>,
) -> aws_sdk_s3::Config {
    let mut builder =
        aws_sdk_s3::config::Builder::from(shared).region(Region::new(region.to_string()));
    if let Some(url) = endpoint.filter(|u| !u.trim().is_empty()) {
        builder = builder.endpoint_url(url.trim_end_matches('/')).force_path_style(true);
    }
    builder.build()
}

#[derive(Debug, Clone)]
pub struct S3Bucket {
    client: Client,
    bucket: String,
}

impl S3Bucket {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_conf(conf: aws_sdk_s3::Config, bucket: impl Into<String>) -> Self {
        Self::new(Client::from_conf(conf), bucket)
    }

    fn missing_bucket(&self) -> StoreError {
        StoreError::Transport(format!("bucket '{}' not found", self.bucket))
    }
}

/// 404 is absence, 401/403 is auth, anything else (including calls that never
/// got a response) is transport.
fn classify<E>(err: SdkError<E, HttpResponse>, context: &str) -> StoreError
where
    E: std::error::Error + 'static,
{
    match err.raw_response().map(|r| r.status().as_u16()) {
        Some(404) => StoreError::NotFound,
        Some(code @ (401 | 403)) => StoreError::Auth(format!("{context}: http {code}")),
        Some(code) => StoreError::Transport(format!("{context}: http {code}: {}", DisplayErrorContext(&err))),
        None => StoreError::Transport(format!("{context}: {}", DisplayErrorContext(&err))),
    }
}

fn to_utc(t: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

fn to_size(name: &str, raw: Option<i64>) -> Result<u64, StoreError> {
    let raw = raw.ok_or_else(|| StoreError::Decode(format!("{name}: missing size")))?;
    u64::try_from(raw).map_err(|_| StoreError::Decode(format!("{name}: negative size {raw}")))
}

#[async_trait::async_trait]
impl ObjectStore for S3Bucket {
    fn location(&self) -> &str {
        &self.bucket
    }

    /// One `ListObjectsV2` page. Paging is driven by the normalizer so each
    /// page gets its own timeout.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.filter(|p| !p.is_empty()).map(str::to_string))
            .set_continuation_token(continuation.map(str::to_string))
            .send()
            .await
            .map_err(|e| match classify(e, "list objects") {
                StoreError::NotFound => self.missing_bucket(),
                other => other,
            })?;

        let mut entries = Vec::with_capacity(out.contents().len());
        for obj in out.contents() {
            let name = obj
                .key()
                .ok_or_else(|| StoreError::Decode("listing entry without key".to_string()))?;
            entries.push(RawEntry {
                name: name.to_string(),
                size: to_size(name, obj.size())?,
                last_modified: obj.last_modified().and_then(to_utc),
            });
        }

        let next = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token()
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        } else {
            None
        };
        Ok(ListPage { entries, next })
    }

    async fn head(&self, key: &str) -> Result<ObjectProps, StoreError> {
        let out = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_not_found()) {
                    StoreError::NotFound
                } else {
                    classify(e, "head object")
                }
            })?;
        Ok(ObjectProps {
            size: to_size(key, out.content_length())?,
            last_modified: out.last_modified().and_then(to_utc),
        })
    }
}

#[async_trait::async_trait]
impl ObjectSink for S3Bucket {
    fn location(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| match classify(e, "put object") {
                StoreError::NotFound => self.missing_bucket(),
                other => other,
            })?;
        Ok(())
    }
}
