//! Test support: an in-process transaction manager
//!
//! Binds transaction handles per calling thread, which is how the tests
//! model "each thread is bound to one ambient transaction".

use parking_lot::Mutex;
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use txcache_core::{TransactionManager, TxnHandle, XaError, XaResult};

/// Transaction manager for tests.
///
/// Each thread binds (and rebinds) its own ambient transaction handle;
/// enlistments are recorded for inspection. An unbound thread gets a
/// transaction-manager error, which is how "the manager cannot supply a
/// transaction" is simulated.
#[derive(Debug, Default)]
pub struct MockTransactionManager {
    bindings: Mutex<HashMap<ThreadId, TxnHandle>>,
    enlistments: Mutex<Vec<(TxnHandle, String)>>,
}

impl MockTransactionManager {
    /// Create a manager with no bound transactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the calling thread to `handle`. Rebinding replaces the previous
    /// binding.
    pub fn bind(&self, handle: TxnHandle) {
        self.bindings.lock().insert(thread::current().id(), handle);
    }

    /// Remove the calling thread's binding.
    pub fn unbind(&self) {
        self.bindings.lock().remove(&thread::current().id());
    }

    /// Every `(transaction, resource)` enlistment seen so far.
    pub fn enlistments(&self) -> Vec<(TxnHandle, String)> {
        self.enlistments.lock().clone()
    }
}

impl TransactionManager for MockTransactionManager {
    fn current_transaction(&self) -> XaResult<TxnHandle> {
        self.bindings
            .lock()
            .get(&thread::current().id())
            .copied()
            .ok_or_else(|| {
                XaError::TransactionManager(
                    "no transaction bound to the calling thread".to_string(),
                )
            })
    }

    fn enlist(&self, txn: TxnHandle, resource: &str) -> XaResult<()> {
        self.enlistments.lock().push((txn, resource.to_string()));
        Ok(())
    }
}
