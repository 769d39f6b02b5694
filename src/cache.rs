/*!
 * Process-wide cache of loaded resources
 *
 * Each resource is read from disk at most once per cache and then shared by
 * every view built from it. Entries are only replaced after an explicit
 * invalidation, which is how a data refresh is signalled.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::{
    Result,
    loader::{RawRecord, RecordLoader},
    schema::Resource,
};

/// Shared, read-mostly table of raw rows keyed by resource
#[derive(Debug)]
pub struct ResourceCache {
    loader: RecordLoader,
    tables: RwLock<HashMap<Resource, Arc<Vec<RawRecord>>>>,
}

impl ResourceCache {
    /// Create an empty cache backed by a loader
    pub fn new(loader: RecordLoader) -> Self {
        Self {
            loader,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Loader used on cache misses
    pub fn loader(&self) -> &RecordLoader {
        &self.loader
    }

    /// Rows of a resource, loading them on first use
    ///
    /// Failed loads are not cached, so a later call retries.
    pub fn get(&self, resource: Resource) -> Result<Arc<Vec<RawRecord>>> {
        if let Some(rows) = self.cached(resource) {
            log::debug!("Cache hit for {}", resource);
            return Ok(rows);
        }

        let rows = Arc::new(self.loader.load(resource)?);

        let mut tables = match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Another thread may have populated the entry while we were reading
        let entry = tables.entry(resource).or_insert(rows);
        Ok(Arc::clone(entry))
    }

    /// Rows of a resource if already loaded
    pub fn cached(&self, resource: Resource) -> Option<Arc<Vec<RawRecord>>> {
        let tables = match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.get(&resource).cloned()
    }

    /// Whether a resource is currently cached
    pub fn contains(&self, resource: Resource) -> bool {
        self.cached(resource).is_some()
    }

    /// Drop one resource so the next request reloads it
    pub fn invalidate(&self, resource: Resource) {
        let mut tables = match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if tables.remove(&resource).is_some() {
            log::debug!("Invalidated cached {}", resource);
        }
    }

    /// Drop every resource
    pub fn invalidate_all(&self) {
        let mut tables = match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.clear();
        log::debug!("Invalidated all cached resources for {}", self.loader.data_dir().display());
    }
}

lazy_static::lazy_static! {
    static ref SHARED_CACHES: RwLock<HashMap<PathBuf, Arc<ResourceCache>>> = RwLock::new(HashMap::new());
}

/// Process-wide cache for a data directory
///
/// Repeated calls with the same directory return the same cache.
pub fn shared_cache<P: AsRef<Path>>(data_dir: P) -> Arc<ResourceCache> {
    let key = data_dir.as_ref().to_path_buf();

    {
        let caches = match SHARED_CACHES.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cache) = caches.get(&key) {
            return Arc::clone(cache);
        }
    }

    let mut caches = match SHARED_CACHES.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let cache = caches.entry(key.clone())
        .or_insert_with(|| Arc::new(ResourceCache::new(RecordLoader::new(&key))));
    Arc::clone(cache)
}
