//! Thread-Safe Cache Storage Engine
//!
//! This module implements the backend store behind the command processor:
//! string values keyed by cache name and key.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **One Keyspace**: All caches share the shards; an entry is addressed by `(cache, key)`.
//! 3. **Async Reads**: `get` hands back a future so slower backends can plug in behind
//!    the same [`Caches`] trait.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::error::HotRodError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Future returned by asynchronous store reads.
pub type CacheFuture<T> = Pin<Box<dyn Future<Output = Result<T, HotRodError>> + Send + 'static>>;

/// Key/value operations the command processor needs from a backend.
///
/// `get` never resolves to a missing future: an absent key resolves to
/// `Ok(None)`.
pub trait Caches: Send + Sync {
    fn put(&self, cache_name: &str, key: String, value: String) -> Result<(), HotRodError>;

    fn get(&self, cache_name: &str, key: String) -> CacheFuture<Option<String>>;

    /// Removes a key, returning whether it existed.
    fn remove(&self, cache_name: &str, key: &str) -> Result<bool, HotRodError>;

    /// Whether requests may address this cache.
    fn is_defined(&self, _cache_name: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    cache: String,
    key: String,
}

/// A single shard containing a portion of the entries.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<CacheKey, String>>,
}

/// The in-memory backend store.
///
/// # Example
///
/// ```
/// use rodgate::storage::{Caches, StorageEngine};
///
/// let engine = StorageEngine::new();
/// engine.put("books", "isbn".to_string(), "title".to_string()).unwrap();
/// assert!(engine.remove("books", "isbn").unwrap());
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    /// Caches clients may address; empty means any name is accepted
    defined: HashSet<String>,

    /// Statistics: total number of keys (approximate)
    key_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("defined", &self.defined)
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a storage engine that accepts any cache name.
    pub fn new() -> Self {
        Self::with_caches(std::iter::empty::<String>())
    }

    /// Creates a storage engine that only accepts the given cache names.
    ///
    /// The default cache (the empty name) is always accepted.
    pub fn with_caches<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            defined: names.into_iter().map(Into::into).collect(),
            key_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn get_shard(&self, key: &CacheKey) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    fn lookup(&self, cache_name: &str, key: String) -> Option<String> {
        let key = CacheKey {
            cache: cache_name.to_string(),
            key,
        };
        self.get_shard(&key).data.read().get(&key).cloned()
    }

    /// Returns the total number of entries across all caches.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Caches for StorageEngine {
    fn put(&self, cache_name: &str, key: String, value: String) -> Result<(), HotRodError> {
        let key = CacheKey {
            cache: cache_name.to_string(),
            key,
        };
        let mut data = self.get_shard(&key).data.write();
        if data.insert(key, value).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn get(&self, cache_name: &str, key: String) -> CacheFuture<Option<String>> {
        let value = self.lookup(cache_name, key);
        Box::pin(std::future::ready(Ok(value)))
    }

    fn remove(&self, cache_name: &str, key: &str) -> Result<bool, HotRodError> {
        let key = CacheKey {
            cache: cache_name.to_string(),
            key: key.to_string(),
        };
        let removed = self.get_shard(&key).data.write().remove(&key).is_some();
        if removed {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    fn is_defined(&self, cache_name: &str) -> bool {
        cache_name.is_empty() || self.defined.is_empty() || self.defined.contains(cache_name)
    }
}
