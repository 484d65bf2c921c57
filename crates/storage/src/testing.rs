//! Test support: stores with injectable faults

use crate::memory::MemoryStore;
use parking_lot::Mutex;
use std::collections::HashSet;
use txcache_core::{CacheKey, Element, Store, XaError, XaResult};

/// Store wrapper that fails writes for selected keys.
///
/// Reads always succeed, so callers can still inspect (and restore) state
/// around an injected failure.
#[derive(Debug, Default)]
pub struct FaultInjectingStore {
    inner: MemoryStore,
    fail_writes_for: Mutex<HashSet<CacheKey>>,
}

impl FaultInjectingStore {
    /// Create an empty store with no faults armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a write fault for `key`: any `put` or `remove` touching it fails.
    pub fn fail_writes_for(&self, key: impl Into<CacheKey>) {
        self.fail_writes_for.lock().insert(key.into());
    }

    /// Disarm all faults.
    pub fn clear_faults(&self) {
        self.fail_writes_for.lock().clear();
    }

    /// The wrapped store, for direct inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check_write(&self, key: &CacheKey) -> XaResult<()> {
        if self.fail_writes_for.lock().contains(key) {
            return Err(XaError::store(format!("injected write fault for {key}")));
        }
        Ok(())
    }
}

impl Store for FaultInjectingStore {
    fn get(&self, key: &CacheKey) -> XaResult<Option<Element>> {
        self.inner.get(key)
    }

    fn put(&self, element: Element) -> XaResult<()> {
        self.check_write(&element.key)?;
        self.inner.put(element)
    }

    fn remove(&self, key: &CacheKey) -> XaResult<Option<Element>> {
        self.check_write(key)?;
        self.inner.remove(key)
    }
}
