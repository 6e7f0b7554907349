//! Listing normalization.
//!
//! Collapses each backend's absence signalling (404 on probe, missing entry in
//! a listing) into `ObjectInfo` with `size == None`, while keeping transport
//! and auth failures as errors.
//!
//! Listings are fully materialized before they are returned: every page is
//! fetched, entries are de-duplicated by name (the last page wins), and the
//! result is sorted by name.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use sv_schemas::ObjectInfo;

use crate::{ListingError, ObjectStore, StoreError};

/// Filters applied to a complete listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only names starting with this prefix. Also passed to the backend.
    pub prefix: Option<String>,
    /// Only objects modified at or after this instant. Objects without a
    /// modification time are excluded while a cutoff is set.
    pub modified_after: Option<DateTime<Utc>>,
}

impl ListRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            modified_after: None,
        }
    }

    pub fn modified_after(mut self, cutoff: Option<DateTime<Utc>>) -> Self {
        self.modified_after = cutoff;
        self
    }

    fn admits(&self, obj: &ObjectInfo) -> bool {
        if let Some(p) = &self.prefix {
            if !obj.name.starts_with(p.as_str()) {
                return false;
            }
        }
        match self.modified_after {
            Some(cutoff) => obj.last_modified.is_some_and(|t| t >= cutoff),
            None => true,
        }
    }
}

/// Applies the per-call timeout to every backend call.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    call_timeout: Duration,
}

impl Normalizer {
    pub fn new(call_timeout: Duration) -> Self {
        Self { call_timeout }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout {
                secs: self.call_timeout.as_secs(),
            }),
        }
    }

    /// Probe one key. Not-found becomes an absent record; every other
    /// failure is returned to the caller.
    pub async fn probe(&self, store: &dyn ObjectStore, key: &str) -> Result<ObjectInfo, StoreError> {
        match self.timed(store.head(key)).await {
            Ok(props) => Ok(ObjectInfo::present(key, props.size, props.last_modified)),
            Err(StoreError::NotFound) => Ok(ObjectInfo::absent(key)),
            Err(e) => Err(e),
        }
    }

    /// Complete listing, de-duplicated by name and sorted by name.
    pub async fn list(
        &self,
        store: &dyn ObjectStore,
        req: &ListRequest,
    ) -> Result<Vec<ObjectInfo>, ListingError> {
        let mut by_name: BTreeMap<String, ObjectInfo> = BTreeMap::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .timed(store.list_page(req.prefix.as_deref(), continuation.as_deref()))
                .await?;
            pages += 1;

            for e in page.entries {
                let obj = ObjectInfo::present(e.name, e.size, e.last_modified);
                by_name.insert(obj.name.clone(), obj);
            }

            match page.next.filter(|n| !n.is_empty()) {
                Some(next) if continuation.as_deref() == Some(next.as_str()) => {
                    return Err(ListingError::Transient(format!(
                        "pagination did not advance on {} (marker repeated)",
                        store.location()
                    )));
                }
                Some(next) => continuation = Some(next),
                None => break,
            }
        }

        let out: Vec<ObjectInfo> = by_name.into_values().filter(|o| req.admits(o)).collect();
        tracing::debug!(
            location = store.location(),
            pages,
            objects = out.len(),
            "listing materialized"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ListPage, ObjectProps, RawEntry};
    use chrono::TimeZone;

    struct Paged {
        pages: Vec<ListPage>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for Paged {
        fn location(&self) -> &str {
            "paged"
        }

        async fn list_page(
            &self,
            _prefix: Option<&str>,
            continuation: Option<&str>,
        ) -> Result<ListPage, StoreError> {
            let idx: usize = continuation.map(|c| c.parse().unwrap()).unwrap_or(0);
            Ok(self.pages[idx].clone())
        }

        async fn head(&self, key: &str) -> Result<ObjectProps, StoreError> {
            match key {
                "here" => Ok(ObjectProps {
                    size: 0,
                    last_modified: None,
                }),
                "denied" => Err(StoreError::Auth("403".into())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(ObjectProps {
                        size: 1,
                        last_modified: None,
                    })
                }
                _ => Err(StoreError::NotFound),
            }
        }
    }

    fn entry(name: &str, size: u64, day: Option<u32>) -> RawEntry {
        RawEntry {
            name: name.to_string(),
            size,
            last_modified: day.map(|d| Utc.with_ymd_and_hms(2025, 9, d, 0, 0, 0).unwrap()),
        }
    }

    fn store() -> Paged {
        Paged {
            pages: vec![
                ListPage {
                    entries: vec![entry("b", 1, Some(5)), entry("a", 2, Some(1))],
                    next: Some("1".into()),
                },
                ListPage {
                    entries: vec![entry("b", 9, Some(7)), entry("c", 3, None)],
                    next: None,
                },
            ],
        }
    }

    #[tokio::test]
    async fn pages_are_merged_deduplicated_and_sorted() {
        let n = Normalizer::new(Duration::from_secs(1));
        let out = n.list(&store(), &ListRequest::all()).await.unwrap();
        let names: Vec<_> = out.iter().map(|o| (o.name.as_str(), o.size)).collect();
        assert_eq!(names, vec![("a", Some(2)), ("b", Some(9)), ("c", Some(3))]);
    }

    #[tokio::test]
    async fn cutoff_excludes_old_and_undated_objects() {
        let n = Normalizer::new(Duration::from_secs(1));
        let cutoff = Utc.with_ymd_and_hms(2025, 9, 5, 0, 0, 0).unwrap();
        let out = n
            .list(&store(), &ListRequest::all().modified_after(Some(cutoff)))
            .await
            .unwrap();
        let names: Vec<_> = out.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[tokio::test]
    async fn repeated_marker_is_a_transient_listing_error() {
        let looping = Paged {
            pages: vec![
                ListPage {
                    entries: vec![],
                    next: Some("1".into()),
                },
                ListPage {
                    entries: vec![],
                    next: Some("1".into()),
                },
            ],
        };
        let n = Normalizer::new(Duration::from_secs(1));
        let err = n.list(&looping, &ListRequest::all()).await.unwrap_err();
        assert!(matches!(err, ListingError::Transient(_)));
    }

    #[tokio::test]
    async fn probe_distinguishes_absent_zero_and_error() {
        let n = Normalizer::new(Duration::from_secs(1));
        let s = store();

        let zero = n.probe(&s, "here").await.unwrap();
        assert!(zero.exists() && zero.is_zero_size());

        let absent = n.probe(&s, "nowhere").await.unwrap();
        assert!(!absent.exists());

        let err = n.probe(&s, "denied").await.unwrap_err();
        assert!(matches!(err, StoreError::Auth(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_times_out_instead_of_hanging() {
        let n = Normalizer::new(Duration::from_secs(2));
        let err = n.probe(&store(), "slow").await.unwrap_err();
        assert_eq!(err, StoreError::Timeout { secs: 2 });
        assert!(err.is_transient());
    }
}
