//! Collaborator traits consumed by the resource coordinator
//!
//! The coordinator sits between two externally supplied collaborators: the
//! transaction manager that drives the protocol and names the ambient
//! transaction, and the backing store that buffered commands execute against
//! at commit. Both are specified here so implementations can be swapped
//! without touching the coordinator.

use crate::error::XaResult;
use crate::types::{CacheKey, Element, TxnHandle};

/// Backing key/value store for one cache.
///
/// A local, synchronous structure. The coordinator mutates it exclusively
/// inside commit, after all version validation has passed; reads may happen
/// at any time.
///
/// Thread safety: all methods must be callable concurrently from multiple
/// threads (`Send + Sync`).
pub trait Store: Send + Sync {
    /// Current element for `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &CacheKey) -> XaResult<Option<Element>>;

    /// Insert or replace an element.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn put(&self, element: Element) -> XaResult<()>;

    /// Remove a key, returning the element it held.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn remove(&self, key: &CacheKey) -> XaResult<Option<Element>>;
}

/// External transaction manager, as seen from this resource.
///
/// Supplies the ambient transaction handle for the calling context and
/// accepts enlistment when a resource joins a transaction for the first
/// time. The lookup is treated as an opaque, fast, synchronous call.
pub trait TransactionManager: Send + Sync {
    /// Handle of the transaction bound to the calling context.
    ///
    /// # Errors
    ///
    /// Returns an error when no transaction is bound or the manager cannot
    /// be reached; the caller decides whether that is fatal.
    fn current_transaction(&self) -> XaResult<TxnHandle>;

    /// Record that `resource` joined transaction `txn`.
    ///
    /// Called exactly once per transaction, when the resource creates the
    /// transaction's context on first cache access.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager refuses the enlistment.
    fn enlist(&self, txn: TxnHandle, resource: &str) -> XaResult<()>;
}
