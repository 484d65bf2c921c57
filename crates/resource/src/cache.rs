//! Transactional cache front-end
//!
//! `XaCache` is the surface callers use inside a transaction. Writes check
//! the key out of the version table and buffer a version-aware command in the
//! ambient transaction's context; nothing reaches the backing store before
//! commit. Reads see the transaction's own buffered writes first, then read
//! through to the store.

use crate::command::WriteCommand;
use crate::resource::CacheXaResource;
use std::sync::Arc;
use txcache_core::{CacheKey, Element, Value, XaError, XaResult};

/// Cache API bound to a [`CacheXaResource`].
#[derive(Debug, Clone)]
pub struct XaCache {
    resource: Arc<CacheXaResource>,
}

impl XaCache {
    /// Wrap a resource.
    pub fn new(resource: Arc<CacheXaResource>) -> Self {
        XaCache { resource }
    }

    /// The underlying resource.
    pub fn resource(&self) -> &Arc<CacheXaResource> {
        &self.resource
    }

    /// Read a value under the ambient transaction.
    ///
    /// The transaction's latest buffered write to `key` wins (a buffered
    /// remove reads as absent); otherwise the committed value is read from
    /// the store.
    ///
    /// # Errors
    ///
    /// Transaction-manager failures resolving the ambient transaction, or
    /// store read failures.
    pub fn get(&self, key: &CacheKey) -> XaResult<Option<Value>> {
        let context = self.resource.get_or_create_transaction_context()?;
        if let Some(pending) = context.pending_value(key) {
            return Ok(pending);
        }
        Ok(self
            .resource
            .store()
            .get(key)?
            .map(|element| element.value))
    }

    /// Buffer a put under the ambient transaction.
    ///
    /// Checks the key out of the version table; the observed version travels
    /// with the command and is validated at prepare.
    ///
    /// # Errors
    ///
    /// Transaction-manager failures, or [`XaError::ContextClosed`] once the
    /// branch has ended.
    pub fn put(&self, element: Element) -> XaResult<()> {
        let context = self.resource.get_or_create_transaction_context()?;
        if !context.is_open() {
            return Err(XaError::ContextClosed);
        }
        let observed = self.resource.checkout(&element.key, context.handle());
        context.add_command(WriteCommand::versioned_put(element, observed))
    }

    /// Buffer a remove under the ambient transaction.
    ///
    /// # Errors
    ///
    /// Transaction-manager failures, or [`XaError::ContextClosed`] once the
    /// branch has ended.
    pub fn remove(&self, key: impl Into<CacheKey>) -> XaResult<()> {
        let key = key.into();
        let context = self.resource.get_or_create_transaction_context()?;
        if !context.is_open() {
            return Err(XaError::ContextClosed);
        }
        let observed = self.resource.checkout(&key, context.handle());
        context.add_command(WriteCommand::versioned_remove(key, observed))
    }
}
