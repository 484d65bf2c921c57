//! Deferred write commands
//!
//! A command is one buffered mutation of the backing store. Commands are
//! immutable once created and owned by their transaction's context until
//! commit executes them, in buffer order, against the store.
//!
//! Version-aware commands were produced by a checkout against the version
//! table and carry the counter value observed at that moment; prepare uses
//! that to detect concurrent modification.

use txcache_core::{CacheKey, Element, Store, Value, XaResult};

/// One deferred mutation of the backing store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCommand {
    /// Unconditional insert/replace.
    Put {
        /// Element to write
        element: Element,
    },
    /// Unconditional removal.
    Remove {
        /// Key to remove
        key: CacheKey,
    },
    /// Insert/replace guarded by an optimistic version observation.
    VersionedPut {
        /// Element to write
        element: Element,
        /// Committed version observed at checkout
        observed_version: u64,
    },
    /// Removal guarded by an optimistic version observation.
    VersionedRemove {
        /// Key to remove
        key: CacheKey,
        /// Committed version observed at checkout
        observed_version: u64,
    },
}

impl WriteCommand {
    /// Unconditional put.
    pub fn put(element: Element) -> Self {
        WriteCommand::Put { element }
    }

    /// Unconditional remove.
    pub fn remove(key: impl Into<CacheKey>) -> Self {
        WriteCommand::Remove { key: key.into() }
    }

    /// Put produced by a checkout.
    pub fn versioned_put(element: Element, observed_version: u64) -> Self {
        WriteCommand::VersionedPut {
            element,
            observed_version,
        }
    }

    /// Remove produced by a checkout.
    pub fn versioned_remove(key: impl Into<CacheKey>, observed_version: u64) -> Self {
        WriteCommand::VersionedRemove {
            key: key.into(),
            observed_version,
        }
    }

    /// The key this command mutates.
    pub fn key(&self) -> &CacheKey {
        match self {
            WriteCommand::Put { element } | WriteCommand::VersionedPut { element, .. } => {
                &element.key
            }
            WriteCommand::Remove { key } | WriteCommand::VersionedRemove { key, .. } => key,
        }
    }

    /// Key and observed version for version-aware commands, `None` for plain
    /// ones.
    pub fn version_aware(&self) -> Option<(&CacheKey, u64)> {
        match self {
            WriteCommand::VersionedPut {
                element,
                observed_version,
            } => Some((&element.key, *observed_version)),
            WriteCommand::VersionedRemove {
                key,
                observed_version,
            } => Some((key, *observed_version)),
            _ => None,
        }
    }

    /// The value this command leaves the key with: `Some` for puts, `None`
    /// for removes. Used for read-your-writes lookups.
    pub fn pending_value(&self) -> Option<&Value> {
        match self {
            WriteCommand::Put { element } | WriteCommand::VersionedPut { element, .. } => {
                Some(&element.value)
            }
            WriteCommand::Remove { .. } | WriteCommand::VersionedRemove { .. } => None,
        }
    }

    /// Apply this command to the store.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure untouched; the caller decides how to
    /// unwind.
    pub fn execute(&self, store: &dyn Store) -> XaResult<()> {
        match self {
            WriteCommand::Put { element } | WriteCommand::VersionedPut { element, .. } => {
                store.put(element.clone())
            }
            WriteCommand::Remove { key } | WriteCommand::VersionedRemove { key, .. } => {
                store.remove(key).map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txcache_storage::MemoryStore;

    #[test]
    fn version_aware_exposes_key_and_observation() {
        let put = WriteCommand::versioned_put(Element::new("a", Value::Int(1)), 3);
        assert_eq!(put.version_aware(), Some((&CacheKey::from("a"), 3)));

        let remove = WriteCommand::versioned_remove("b", 5);
        assert_eq!(remove.version_aware(), Some((&CacheKey::from("b"), 5)));

        assert!(WriteCommand::put(Element::new("c", Value::Null))
            .version_aware()
            .is_none());
        assert!(WriteCommand::remove("d").version_aware().is_none());
    }

    #[test]
    fn pending_value_reflects_outcome() {
        let put = WriteCommand::put(Element::new("a", Value::Int(1)));
        assert_eq!(put.pending_value(), Some(&Value::Int(1)));

        let remove = WriteCommand::versioned_remove("a", 0);
        assert!(remove.pending_value().is_none());
    }

    #[test]
    fn execute_applies_to_store() {
        let store = MemoryStore::new();

        WriteCommand::versioned_put(Element::new("a", Value::Int(1)), 0)
            .execute(&store)
            .unwrap();
        assert_eq!(
            store.get(&CacheKey::from("a")).unwrap().unwrap().value,
            Value::Int(1)
        );

        WriteCommand::versioned_remove("a", 0).execute(&store).unwrap();
        assert!(store.get(&CacheKey::from("a")).unwrap().is_none());

        // Removing an absent key is not an error.
        WriteCommand::remove("never-there").execute(&store).unwrap();
    }
}
