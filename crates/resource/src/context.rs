//! Per-transaction write buffer
//!
//! A `TransactionContext` is created lazily, once, on the first cache access
//! within a transaction, and owns the ordered sequence of write commands that
//! commit will replay against the store. It is shared as an `Arc` from the
//! coordinator's context table and destroyed when the transaction reaches a
//! terminal protocol state.

use crate::command::WriteCommand;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use txcache_core::{CacheKey, TxnHandle, Value, XaError, XaResult};

/// Buffer of deferred writes for one transaction.
#[derive(Debug)]
pub struct TransactionContext {
    handle: TxnHandle,
    commands: Mutex<Vec<WriteCommand>>,
    open: AtomicBool,
}

impl TransactionContext {
    /// Create an empty, open context for `handle`.
    pub fn new(handle: TxnHandle) -> Self {
        TransactionContext {
            handle,
            commands: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        }
    }

    /// The owning transaction's handle.
    pub fn handle(&self) -> TxnHandle {
        self.handle
    }

    /// Buffer a command. Commands apply at commit in the order they were
    /// added.
    ///
    /// # Errors
    ///
    /// [`XaError::ContextClosed`] once the branch has ended and the context
    /// stopped accepting work.
    pub fn add_command(&self, command: WriteCommand) -> XaResult<()> {
        let mut commands = self.commands.lock();
        if !self.open.load(Ordering::Acquire) {
            return Err(XaError::ContextClosed);
        }
        commands.push(command);
        Ok(())
    }

    /// Stop accepting commands. Called when the branch ends.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// True while the context accepts commands.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Snapshot of the buffered commands, in order.
    pub fn commands(&self) -> Vec<WriteCommand> {
        self.commands.lock().clone()
    }

    /// Number of buffered commands.
    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }

    /// True when nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }

    /// Read-your-writes lookup: the value the latest buffered command leaves
    /// `key` with.
    ///
    /// `Some(Some(value))` for a buffered put, `Some(None)` for a buffered
    /// remove, `None` when no buffered command touches the key.
    pub fn pending_value(&self, key: &CacheKey) -> Option<Option<Value>> {
        let commands = self.commands.lock();
        commands
            .iter()
            .rev()
            .find(|command| command.key() == key)
            .map(|command| command.pending_value().cloned())
    }

    /// Distinct keys of the version-aware commands, in first-buffered order.
    ///
    /// Checkins at commit/rollback must release each key exactly once even
    /// when several commands touched it.
    pub fn version_aware_keys(&self) -> Vec<CacheKey> {
        let commands = self.commands.lock();
        let mut keys: Vec<CacheKey> = Vec::new();
        for command in commands.iter() {
            if let Some((key, _)) = command.version_aware() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        keys
    }
}
