//! The transaction-resource coordinator
//!
//! `CacheXaResource` is the participant an external transaction manager
//! drives through the two-phase protocol. It owns three registries — branch
//! id → transaction handle + branch state, transaction handle → write buffer,
//! and the per-key version table — and mediates between the manager and the
//! backing store.
//!
//! ## Protocol sequence
//!
//! ```text
//! 1. start(gtrid)            - bind the branch to the ambient transaction
//! 2. (cache operations)      - checkout keys, buffer version-aware commands
//! 3. end(gtrid)              - branch stops accepting work
//! 4. prepare(gtrid)          - validate every observed version; vote
//! 5. commit(gtrid, false)    - replay the buffer against the store
//!    ... or rollback(gtrid)  - discard the buffer, release checkouts
//! ```
//!
//! The store is mutated exclusively inside step 5, after validation; a
//! conflicting transaction is rejected at prepare and never partially
//! committed. Every call naming an unregistered branch fails with a typed
//! error.

use crate::config::ResourceConfig;
use crate::context::TransactionContext;
use crate::version::VersionTable;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txcache_core::{
    CacheKey, Element, Gtrid, Store, TransactionManager, TxnHandle, XaError, XaFlags, XaResult,
};

/// Protocol state of one transaction branch.
///
/// Transitions:
/// - `Started` → `Ended` (end)
/// - `Ended` → `Prepared` (prepare) or → `Committed` (read-only prepare,
///   one-phase commit)
/// - `Started` → `Committed` (one-phase commit)
/// - `Prepared` → `Committed` (commit)
/// - any non-committed state → `RolledBack` (rollback)
/// - post-prepare states → `Forgotten` (forget)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchState {
    /// Branch is bound to a transaction and accepting work
    Started,
    /// Branch is done accepting work for this resource
    Ended,
    /// Branch voted yes and awaits the outcome
    Prepared,
    /// Branch committed; terminal
    Committed,
    /// Branch rolled back; terminal
    RolledBack,
    /// Outcome bookkeeping cleared by `forget`; terminal
    Forgotten,
}

impl BranchState {
    /// Short name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            BranchState::Started => "STARTED",
            BranchState::Ended => "ENDED",
            BranchState::Prepared => "PREPARED",
            BranchState::Committed => "COMMITTED",
            BranchState::RolledBack => "ROLLED_BACK",
            BranchState::Forgotten => "FORGOTTEN",
        }
    }
}

/// Outcome of a successful prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// Branch has work to commit; the manager must drive commit or rollback
    Ok,
    /// Branch buffered nothing; it is already complete and the manager will
    /// not call commit
    ReadOnly,
}

#[derive(Debug)]
struct Branch {
    handle: TxnHandle,
    state: BranchState,
}

/// The XA-style transactional resource fronting one cache.
pub struct CacheXaResource {
    cache_name: String,
    store: Arc<dyn Store>,
    txn_manager: Arc<dyn TransactionManager>,
    branches: DashMap<Gtrid, Branch>,
    contexts: DashMap<TxnHandle, Arc<TransactionContext>>,
    version_table: VersionTable,
    timeout_secs: AtomicU64,
    config: ResourceConfig,
}

impl CacheXaResource {
    /// Create a resource for `cache_name` over `store`, driven by
    /// `txn_manager`, with default configuration.
    pub fn new(
        cache_name: impl Into<String>,
        store: Arc<dyn Store>,
        txn_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self::with_config(cache_name, store, txn_manager, ResourceConfig::default())
    }

    /// Create a resource with explicit configuration.
    pub fn with_config(
        cache_name: impl Into<String>,
        store: Arc<dyn Store>,
        txn_manager: Arc<dyn TransactionManager>,
        config: ResourceConfig,
    ) -> Self {
        let timeout_secs = AtomicU64::new(config.default_timeout.as_secs());
        CacheXaResource {
            cache_name: cache_name.into(),
            store,
            txn_manager,
            branches: DashMap::new(),
            contexts: DashMap::new(),
            version_table: VersionTable::new(),
            timeout_secs,
            config,
        }
    }

    /// Name of the cache this resource fronts.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The optimistic-concurrency table.
    pub fn version_table(&self) -> &VersionTable {
        &self.version_table
    }

    /// Current state of a branch, if registered.
    pub fn branch_state(&self, gtrid: &Gtrid) -> Option<BranchState> {
        self.branches.get(gtrid).map(|branch| branch.state)
    }

    // === Protocol surface ===

    /// Associate `gtrid` with the caller's ambient transaction.
    ///
    /// Registration is first-writer-wins: re-starting a known branch
    /// (join/resume) leaves the existing association untouched.
    ///
    /// # Errors
    ///
    /// [`XaError::BindingFailure`] when the transaction manager cannot supply
    /// a current transaction; fatal to the branch and not retried.
    pub fn start(&self, gtrid: &Gtrid, flags: XaFlags) -> XaResult<()> {
        tracing::debug!(gtrid = %gtrid, flags = ?flags, "start");
        let handle = self
            .txn_manager
            .current_transaction()
            .map_err(|source| XaError::BindingFailure {
                gtrid: gtrid.clone(),
                reason: source.to_string(),
            })?;
        self.branches
            .entry(gtrid.clone())
            .or_insert_with(|| Branch {
                handle,
                state: BranchState::Started,
            });
        Ok(())
    }

    /// Mark the branch as done accepting work for this resource.
    ///
    /// The transaction's write buffer stops accepting commands.
    ///
    /// # Errors
    ///
    /// [`XaError::UnknownBranch`] for an unregistered gtrid,
    /// [`XaError::IllegalState`] unless the branch is `Started`.
    pub fn end(&self, gtrid: &Gtrid, flags: XaFlags) -> XaResult<()> {
        tracing::debug!(gtrid = %gtrid, flags = ?flags, "end");
        let mut branch = self.lookup_mut(gtrid)?;
        match branch.state {
            BranchState::Started => {
                if let Some(context) = self.contexts.get(&branch.handle) {
                    context.close();
                }
                branch.state = BranchState::Ended;
                Ok(())
            }
            state => Err(XaError::IllegalState {
                gtrid: gtrid.clone(),
                state: state.name(),
                operation: "end",
            }),
        }
    }

    /// Validate every version-aware buffered command and vote.
    ///
    /// A branch with nothing buffered is read-only: it completes immediately
    /// and [`PrepareOutcome::ReadOnly`] tells the manager not to drive
    /// commit. Otherwise each observed version must still equal the key's
    /// committed version; the first stale key fails the branch, which then
    /// requires rollback.
    ///
    /// # Errors
    ///
    /// [`XaError::UnknownBranch`], [`XaError::IllegalState`] unless `Ended`,
    /// [`XaError::VersionConflict`] on concurrent modification.
    pub fn prepare(&self, gtrid: &Gtrid) -> XaResult<PrepareOutcome> {
        let mut branch = self.lookup_mut(gtrid)?;
        if branch.state != BranchState::Ended {
            return Err(XaError::IllegalState {
                gtrid: gtrid.clone(),
                state: branch.state.name(),
                operation: "prepare",
            });
        }

        let commands = self
            .contexts
            .get(&branch.handle)
            .map(|context| context.commands())
            .unwrap_or_default();

        if commands.is_empty() {
            self.contexts.remove(&branch.handle);
            branch.state = BranchState::Committed;
            tracing::debug!(gtrid = %gtrid, "prepare: read-only");
            return Ok(PrepareOutcome::ReadOnly);
        }

        for command in &commands {
            if let Some((key, observed)) = command.version_aware() {
                if !self.version_table.valid(key, branch.handle) {
                    let actual = self
                        .version_table
                        .committed_version(key)
                        .unwrap_or(observed);
                    tracing::debug!(gtrid = %gtrid, key = %key, "prepare: version conflict");
                    return Err(XaError::VersionConflict {
                        key: key.clone(),
                        expected: observed,
                        actual,
                    });
                }
            }
        }

        branch.state = BranchState::Prepared;
        tracing::debug!(gtrid = %gtrid, commands = commands.len(), "prepared");
        Ok(PrepareOutcome::Ok)
    }

    /// Replay the branch's buffered commands against the store, in buffer
    /// order.
    ///
    /// Requires a successful prepare, or `one_phase` — in which case the
    /// validation is implicitly skipped and the resource trusts the caller.
    /// This is the only point at which store mutation becomes visible.
    ///
    /// All-or-nothing: the prior state of each key is captured before its
    /// command executes, and a failure mid-buffer unwinds the applied prefix
    /// before reporting [`XaError::CommitFailed`]. The branch then still
    /// requires rollback.
    ///
    /// # Errors
    ///
    /// [`XaError::UnknownBranch`], [`XaError::IllegalState`] for an
    /// out-of-order call, [`XaError::CommitFailed`] when the store rejects a
    /// command.
    pub fn commit(&self, gtrid: &Gtrid, one_phase: bool) -> XaResult<()> {
        let mut branch = self.lookup_mut(gtrid)?;
        let allowed = if one_phase {
            matches!(branch.state, BranchState::Started | BranchState::Ended)
        } else {
            branch.state == BranchState::Prepared
        };
        if !allowed {
            return Err(XaError::IllegalState {
                gtrid: gtrid.clone(),
                state: branch.state.name(),
                operation: "commit",
            });
        }

        let Some(context) = self
            .contexts
            .get(&branch.handle)
            .map(|entry| Arc::clone(&entry))
        else {
            branch.state = BranchState::Committed;
            return Ok(());
        };

        let commands = context.commands();
        let mut applied: Vec<(CacheKey, Option<Element>)> = Vec::with_capacity(commands.len());
        for command in &commands {
            let prior = match self.store.get(command.key()) {
                Ok(prior) => prior,
                Err(source) => {
                    self.undo(&applied);
                    return Err(XaError::CommitFailed {
                        gtrid: gtrid.clone(),
                        reason: source.to_string(),
                    });
                }
            };
            if let Err(source) = command.execute(self.store.as_ref()) {
                self.undo(&applied);
                tracing::warn!(
                    gtrid = %gtrid,
                    key = %command.key(),
                    error = %source,
                    "commit failed, applied prefix undone"
                );
                return Err(XaError::CommitFailed {
                    gtrid: gtrid.clone(),
                    reason: source.to_string(),
                });
            }
            applied.push((command.key().clone(), prior));
        }

        // Publish the new versions and release the bookkeeping.
        for key in context.version_aware_keys() {
            self.version_table.checkin(&key, branch.handle, false);
        }
        self.contexts.remove(&branch.handle);
        branch.state = BranchState::Committed;
        tracing::info!(gtrid = %gtrid, commands = commands.len(), one_phase, "committed");
        Ok(())
    }

    /// Restore the captured prior states, newest first.
    fn undo(&self, applied: &[(CacheKey, Option<Element>)]) {
        for (key, prior) in applied.iter().rev() {
            let restore = match prior {
                Some(element) => self.store.put(element.clone()),
                None => self.store.remove(key).map(|_| ()),
            };
            if let Err(source) = restore {
                tracing::error!(key = %key, error = %source, "failed to restore prior state");
            }
        }
    }

    /// Discard the branch's buffer without executing anything and release
    /// its version checkouts.
    ///
    /// Safe to call when no work was buffered; a branch without a context
    /// simply transitions.
    ///
    /// # Errors
    ///
    /// [`XaError::UnknownBranch`], or [`XaError::IllegalState`] when the
    /// branch already committed.
    pub fn rollback(&self, gtrid: &Gtrid) -> XaResult<()> {
        let mut branch = self.lookup_mut(gtrid)?;
        if branch.state == BranchState::Committed {
            return Err(XaError::IllegalState {
                gtrid: gtrid.clone(),
                state: branch.state.name(),
                operation: "rollback",
            });
        }
        if let Some((_, context)) = self.contexts.remove(&branch.handle) {
            for key in context.version_aware_keys() {
                self.version_table.checkin(&key, branch.handle, true);
            }
        }
        branch.state = BranchState::RolledBack;
        tracing::info!(gtrid = %gtrid, "rolled back");
        Ok(())
    }

    /// Clear outcome bookkeeping for a post-prepare branch. No-op when there
    /// is nothing to forget.
    pub fn forget(&self, gtrid: &Gtrid) {
        let removed = self.branches.remove_if(gtrid, |_, branch| {
            matches!(
                branch.state,
                BranchState::Prepared
                    | BranchState::Committed
                    | BranchState::RolledBack
                    | BranchState::Forgotten
            )
        });
        if let Some((_, branch)) = removed {
            self.contexts.remove(&branch.handle);
            tracing::debug!(gtrid = %gtrid, "forgotten");
        }
    }

    /// Branches that are prepared but not yet completed, for recovery
    /// reconciliation.
    ///
    /// Exact for the lifetime of this coordinator instance; prepared branches
    /// are not persisted across restarts. The set is reported once, for the
    /// scan-opening call; continuation scans are empty.
    pub fn recover(&self, flags: XaFlags) -> Vec<Gtrid> {
        if !flags.contains(XaFlags::START_RSCAN) {
            return Vec::new();
        }
        self.branches
            .iter()
            .filter(|entry| entry.value().state == BranchState::Prepared)
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Whether `other` represents the same underlying resource manager — the
    /// same cache — so the transaction manager can avoid enlisting duplicate
    /// branches.
    pub fn is_same_rm(&self, other: &CacheXaResource) -> bool {
        self.cache_name == other.cache_name
    }

    /// Set the transaction timeout in seconds. Zero restores the configured
    /// default. Returns `true` when the value was accepted.
    ///
    /// # Errors
    ///
    /// [`XaError::InvalidTimeout`] for negative values.
    pub fn set_transaction_timeout(&self, seconds: i64) -> XaResult<bool> {
        if seconds < 0 {
            return Err(XaError::InvalidTimeout { seconds });
        }
        let effective = if seconds == 0 {
            self.config.default_timeout.as_secs()
        } else {
            seconds as u64
        };
        self.timeout_secs.store(effective, Ordering::SeqCst);
        Ok(true)
    }

    /// Current transaction timeout in seconds.
    pub fn transaction_timeout(&self) -> u64 {
        self.timeout_secs.load(Ordering::SeqCst)
    }

    // === Context and version access for the cache front-end ===

    /// The write buffer for the ambient transaction, created (and the
    /// resource enlisted) on first access.
    ///
    /// Safe under concurrent first-access races: insert-if-absent picks one
    /// winner and every caller receives it; a racing creator discards its own
    /// context and adopts the winner.
    ///
    /// # Errors
    ///
    /// [`XaError::TransactionManager`] when no ambient transaction can be
    /// resolved or enlistment fails.
    pub fn get_or_create_transaction_context(&self) -> XaResult<Arc<TransactionContext>> {
        let handle = self.txn_manager.current_transaction()?;
        if let Some(context) = self.contexts.get(&handle) {
            return Ok(Arc::clone(&context));
        }
        self.txn_manager.enlist(handle, &self.cache_name)?;
        let context = self
            .contexts
            .entry(handle)
            .or_insert_with(|| Arc::new(TransactionContext::new(handle)));
        Ok(Arc::clone(&context))
    }

    /// Record `txn`'s observation of `key`'s committed version and return it.
    pub fn checkout(&self, key: &CacheKey, txn: TxnHandle) -> u64 {
        self.version_table.checkout(key, txn)
    }

    fn lookup_mut(
        &self,
        gtrid: &Gtrid,
    ) -> XaResult<dashmap::mapref::one::RefMut<'_, Gtrid, Branch>> {
        self.branches
            .get_mut(gtrid)
            .ok_or_else(|| XaError::UnknownBranch {
                gtrid: gtrid.clone(),
            })
    }
}

impl std::fmt::Debug for CacheXaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheXaResource")
            .field("cache_name", &self.cache_name)
            .field("branches", &self.branches.len())
            .field("contexts", &self.contexts.len())
            .field("tracked_keys", &self.version_table.len())
            .finish()
    }
}
