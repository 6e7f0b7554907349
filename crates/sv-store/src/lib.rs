//! sv-store
//!
//! Store boundary for the sync validator.
//!
//! - [`ObjectStore`]: paged listing + single-key metadata probe. Implemented by
//!   the blob container client ([`azure::AzureBlobContainer`]) and the bucket
//!   client ([`s3::S3Bucket`]).
//! - [`ObjectSink`]: single-object upload, used for report persistence.
//! - [`normalizer::Normalizer`]: turns either backend into complete,
//!   de-duplicated [`sv_schemas::ObjectInfo`] sequences with per-call timeouts.
//!
//! The clients are read-only except for [`ObjectSink::put_object`].

pub mod azure;
pub mod normalizer;
pub mod s3;
mod sign;
mod xml;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use normalizer::{ListRequest, Normalizer};

// ---------------------------------------------------------------------------
// Raw backend records
// ---------------------------------------------------------------------------

/// One entry of a backend listing page, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a backend listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<RawEntry>,
    /// Opaque continuation marker. `None` on the last page.
    pub next: Option<String>,
}

/// Metadata returned by a single-key probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectProps {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error from one backend call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend reported the object as not found.
    #[error("object not found")]
    NotFound,
    /// Credentials rejected or missing permissions (HTTP 401/403).
    #[error("STORE_AUTH: {0}")]
    Auth(String),
    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },
    /// Network failure or unexpected HTTP status.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// `true` for failures that are isolated to one key or one listing and
    /// never abort a run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Timeout { .. } | StoreError::Transport(_) | StoreError::Decode(_)
        )
    }

    pub(crate) fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        match status.as_u16() {
            404 => StoreError::NotFound,
            401 | 403 => StoreError::Auth(format!("{context}: http {}", status.as_u16())),
            other => StoreError::Transport(format!("{context}: http {other}")),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

/// Error from a complete listing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// Fatal for the run.
    #[error("STORE_AUTH: listing rejected: {0}")]
    Auth(String),
    /// Recorded against the affected expectations; the run continues.
    #[error("listing failed: {0}")]
    Transient(String),
}

impl From<StoreError> for ListingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Auth(msg) => ListingError::Auth(msg),
            other => ListingError::Transient(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read-only access to one container or bucket.
///
/// Implementations must be `Send + Sync` and safe for concurrent read-only use;
/// the run shares one handle across listing and probe tasks.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Container or bucket name, used in logs and reports.
    fn location(&self) -> &str;

    /// Fetch one listing page. `continuation` is the previous page's `next`.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    /// Metadata for one key. A missing object is `Err(StoreError::NotFound)`.
    async fn head(&self, key: &str) -> Result<ObjectProps, StoreError>;
}

/// Single-object writer.
#[async_trait::async_trait]
pub trait ObjectSink: Send + Sync {
    fn location(&self) -> &str;

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}
