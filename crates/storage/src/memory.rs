//! In-memory backing store
//!
//! DashMap-backed: lock-free reads, sharded writes, no cross-key contention.

use dashmap::DashMap;
use txcache_core::{CacheKey, Element, Store, XaResult};

/// In-memory [`Store`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<CacheKey, Element>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemoryStore {
            entries: DashMap::new(),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when `key` is present.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &CacheKey) -> XaResult<Option<Element>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, element: Element) -> XaResult<()> {
        self.entries.insert(element.key.clone(), element);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> XaResult<Option<Element>> {
        Ok(self.entries.remove(key).map(|(_, element)| element))
    }
}
