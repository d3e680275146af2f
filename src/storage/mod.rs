//! Storage Module
//!
//! This module provides the two stores behind the command processor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │        StorageEngine         │   │        MultimapStore         │
//! │  (cache, key) -> value       │   │  cache -> key -> [values]    │
//! │  64 RwLock shards            │   │  created on first access     │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! The command processor talks to the primary store through the [`Caches`]
//! trait, so another backend can be dropped in without touching dispatch.
//!
//! ## Example
//!
//! ```
//! use rodgate::storage::{Caches, MultimapStore, StorageEngine};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//! engine.put("cacheA", "name".to_string(), "Ariz".to_string()).unwrap();
//!
//! let multimaps = MultimapStore::new();
//! multimaps.get_or_create("cacheA").put("tags".to_string(), Bytes::from("rust"));
//! ```

pub mod engine;
pub mod multimap;

// Re-export commonly used types
pub use engine::{CacheFuture, Caches, StorageEngine};
pub use multimap::{Multimap, MultimapStore};
