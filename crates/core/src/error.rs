//! Error types for the transactional cache resource
//!
//! One crate-wide error enum covers every failure the protocol surface can
//! report. We use `thiserror` for the `Display` and `Error` implementations.

use crate::types::{CacheKey, Gtrid};
use thiserror::Error;

/// Result type alias for txcache operations
pub type XaResult<T> = std::result::Result<T, XaError>;

/// Error types for the transactional cache resource
#[derive(Debug, Error)]
pub enum XaError {
    /// The transaction manager could not supply a transaction during `start`.
    ///
    /// Fatal to the branch: without a bound transaction handle no work can be
    /// associated with it. Never retried internally.
    #[error("cannot bind branch {gtrid} to a transaction: {reason}")]
    BindingFailure {
        /// Branch that could not be bound
        gtrid: Gtrid,
        /// Underlying transaction-manager failure
        reason: String,
    },

    /// Protocol call for a branch id this resource has never seen.
    #[error("unknown transaction branch: {gtrid}")]
    UnknownBranch {
        /// The unrecognized branch id
        gtrid: Gtrid,
    },

    /// Protocol call arrived in a state that does not permit it.
    #[error("{operation} is not valid for branch {gtrid} in state {state}")]
    IllegalState {
        /// Branch the call named
        gtrid: Gtrid,
        /// State the branch was in
        state: &'static str,
        /// The offending operation
        operation: &'static str,
    },

    /// Prepare-time validation found a key whose committed version advanced
    /// since this transaction checked it out.
    ///
    /// Recoverable by the transaction manager via rollback; never retried
    /// internally.
    #[error("version conflict on key {key}: observed {expected}, committed is now {actual}")]
    VersionConflict {
        /// The conflicting key
        key: CacheKey,
        /// Version observed at checkout
        expected: u64,
        /// Committed version found at prepare
        actual: u64,
    },

    /// Work was offered to a transaction that is no longer accepting it.
    #[error("transaction is no longer accepting work")]
    ContextClosed,

    /// A buffered command failed while being applied at commit.
    ///
    /// The already-applied prefix has been undone; the branch still requires
    /// rollback.
    #[error("commit of branch {gtrid} failed and was undone: {reason}")]
    CommitFailed {
        /// Branch whose commit failed
        gtrid: Gtrid,
        /// Underlying store failure
        reason: String,
    },

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Transaction manager failure outside of `start`.
    #[error("transaction manager error: {0}")]
    TransactionManager(String),

    /// Timeout setter misuse.
    #[error("invalid transaction timeout: {seconds}")]
    InvalidTimeout {
        /// The rejected value
        seconds: i64,
    },
}

impl XaError {
    /// Build a store error from anything displayable.
    pub fn store(message: impl Into<String>) -> Self {
        XaError::Store(message.into())
    }

    /// True for [`XaError::UnknownBranch`].
    pub fn is_unknown_branch(&self) -> bool {
        matches!(self, XaError::UnknownBranch { .. })
    }

    /// True for [`XaError::VersionConflict`].
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, XaError::VersionConflict { .. })
    }

    /// True for [`XaError::IllegalState`].
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, XaError::IllegalState { .. })
    }
}
