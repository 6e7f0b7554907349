use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sv_config::secrets::SecretError;
use sv_config::{Locations, ValidatorConfig};
use sv_runtime::{RunError, RunStores, StoreFactory};
use sv_store::{ListPage, ObjectProps, ObjectSink, ObjectStore, RawEntry, StoreError};

#[derive(Debug, Clone)]
struct Stored {
    size: u64,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Faults {
    probe: BTreeMap<String, StoreError>,
    listing: Option<StoreError>,
    put: Option<StoreError>,
}

/// Object store held in memory.
///
/// Listings are served in pages of `page_size` names with the last name of
/// each page as the continuation marker.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, Stored>>,
    faults: Mutex<Faults>,
    puts: Mutex<Vec<(String, Vec<u8>)>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            page_size: 2,
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            puts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn put(&self, key: &str, size: u64, last_modified: Option<DateTime<Utc>>) -> &Self {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(key.to_string(), Stored { size, last_modified });
        }
        self
    }

    /// Probes of `key` fail with `error`.
    pub fn fail_probe(&self, key: &str, error: StoreError) -> &Self {
        if let Ok(mut f) = self.faults.lock() {
            f.probe.insert(key.to_string(), error);
        }
        self
    }

    /// Every listing page fails with `error`.
    pub fn fail_listing(&self, error: StoreError) -> &Self {
        if let Ok(mut f) = self.faults.lock() {
            f.listing = Some(error);
        }
        self
    }

    /// Uploads fail with `error`.
    pub fn fail_put(&self, error: StoreError) -> &Self {
        if let Ok(mut f) = self.faults.lock() {
            f.put = Some(error);
        }
        self
    }

    /// Number of list/head calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Uploaded `(key, body)` pairs, in order.
    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.puts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn lock_objects(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Stored>>, StoreError> {
        self.objects
            .lock()
            .map_err(|_| StoreError::Transport("memory store poisoned".to_string()))
    }

    fn fault(&self, pick: impl FnOnce(&Faults) -> Option<&StoreError>) -> Result<(), StoreError> {
        let faults = self
            .faults
            .lock()
            .map_err(|_| StoreError::Transport("memory store poisoned".to_string()))?;
        match pick(&faults) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    fn location(&self) -> &str {
        &self.name
    }

    async fn list_page(&self, prefix: Option<&str>, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fault(|f| f.listing.as_ref())?;

        let objects = self.lock_objects()?;
        let prefix = prefix.unwrap_or("");
        let mut entries: Vec<RawEntry> = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| continuation.map_or(true, |c| k.as_str() > c))
            .take(self.page_size + 1)
            .map(|(k, s)| RawEntry {
                name: k.clone(),
                size: s.size,
                last_modified: s.last_modified,
            })
            .collect();

        let next = if entries.len() > self.page_size {
            entries.truncate(self.page_size);
            entries.last().map(|e| e.name.clone())
        } else {
            None
        };
        Ok(ListPage { entries, next })
    }

    async fn head(&self, key: &str) -> Result<ObjectProps, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.fault(|f| f.probe.get(key))?;

        let objects = self.lock_objects()?;
        objects
            .get(key)
            .map(|s| ObjectProps {
                size: s.size,
                last_modified: s.last_modified,
            })
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait::async_trait]
impl ObjectSink for MemoryStore {
    fn location(&self) -> &str {
        &self.name
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        self.fault(|f| f.put.as_ref())?;
        self.puts
            .lock()
            .map_err(|_| StoreError::Transport("memory store poisoned".to_string()))?
            .push((key.to_string(), body));
        Ok(())
    }
}

/// Hands out the same pair of memory stores for every run.
pub struct MemoryStoreFactory {
    source: Arc<MemoryStore>,
    target: Arc<MemoryStore>,
    secret: Mutex<Option<SecretError>>,
    opened: AtomicUsize,
    seen: Mutex<Vec<Locations>>,
}

impl MemoryStoreFactory {
    pub fn new(source: Arc<MemoryStore>, target: Arc<MemoryStore>) -> Self {
        Self {
            source,
            target,
            secret: Mutex::new(None),
            opened: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Opening fails as if the connection secret were missing.
    pub fn fail_secret(&self, error: SecretError) {
        if let Ok(mut s) = self.secret.lock() {
            *s = Some(error);
        }
    }

    /// Times a run got as far as opening stores.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Locations requested, in order.
    pub fn locations(&self) -> Vec<Locations> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl StoreFactory for MemoryStoreFactory {
    async fn open(&self, _config: &ValidatorConfig, locations: &Locations) -> Result<RunStores, RunError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(locations.clone());
        }
        let secret = self.secret.lock().ok().and_then(|s| s.clone());
        if let Some(e) = secret {
            return Err(e.into());
        }
        Ok(RunStores {
            source: self.source.clone(),
            target: self.target.clone(),
            report_sink: Some(self.target.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use sv_store::{ListRequest, Normalizer};

    #[tokio::test]
    async fn pagination_yields_every_object_once() {
        let store = MemoryStore::new("mem");
        for i in 0..5 {
            store.put(&format!("k{i}"), i, None);
        }
        let out = Normalizer::new(Duration::from_secs(1))
            .list(&store, &ListRequest::all())
            .await
            .unwrap();
        assert_eq!(out.len(), 5);
        assert!(store.calls() >= 3);
    }
}
