//! Multimap Store
//!
//! Per-cache append logs: each cache name owns a map from key to the ordered
//! list of values written under it. Entirely in memory, with no eviction and
//! no size bound.
//!
//! ```text
//! MultimapStore
//!   ├── "cacheA" ─> Multimap { "k1" ─> [v1, v2, v3], "k2" ─> [v1] }
//!   └── "cacheB" ─> Multimap { ... }
//! ```

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The key to value-list map of a single cache.
#[derive(Debug, Default)]
pub struct Multimap {
    entries: RwLock<HashMap<String, Vec<Bytes>>>,
}

impl Multimap {
    /// Returns a snapshot of the values under `key`, or `None` if nothing was
    /// ever written there.
    pub fn get(&self, key: &str) -> Option<Vec<Bytes>> {
        self.entries.read().get(key).cloned()
    }

    /// Appends `value` under `key`, creating the list on first write.
    ///
    /// Returns the length of the list after the append.
    pub fn put(&self, key: String, value: Bytes) -> usize {
        let mut entries = self.entries.write();
        let values = entries.entry(key).or_default();
        values.push(value);
        values.len()
    }

    /// Number of keys holding at least one value.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry of multimaps, one per cache name, created on first access.
#[derive(Debug, Default)]
pub struct MultimapStore {
    maps: RwLock<HashMap<String, Arc<Multimap>>>,
}

impl MultimapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the multimap of `cache_name`, creating it if needed.
    ///
    /// Concurrent first accesses for the same name all receive the same
    /// instance.
    pub fn get_or_create(&self, cache_name: &str) -> Arc<Multimap> {
        if let Some(map) = self.maps.read().get(cache_name) {
            return Arc::clone(map);
        }
        let mut maps = self.maps.write();
        Arc::clone(maps.entry(cache_name.to_string()).or_default())
    }

    /// Drops every multimap.
    pub fn clear(&self) {
        self.maps.write().clear();
    }

    /// Number of caches that have a multimap.
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
