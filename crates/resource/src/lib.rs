//! Transactional resource core for txcache
//!
//! This crate implements the participant that lets a cache join an XA-style
//! distributed transaction:
//!
//! - [`CacheXaResource`]: the two-phase-commit coordinator the external
//!   transaction manager drives (start/end/prepare/commit/rollback/forget/
//!   recover)
//! - [`TransactionContext`]: the per-transaction buffer of deferred
//!   [`WriteCommand`]s, replayed against the store only at commit
//! - [`VersionTable`] / [`Version`]: per-key optimistic concurrency control —
//!   writes record the version they observed at checkout, prepare validates
//!   the observation, commit publishes a new version
//! - [`XaCache`]: the caller-facing cache surface that routes writes through
//!   checkout and the buffer
//!
//! Either every buffered write of a transaction becomes visible atomically at
//! commit, or none does; a transaction whose keys were modified by another
//! committer since checkout is rejected at prepare.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod command;
pub mod config;
pub mod context;
pub mod resource;
pub mod testing;
pub mod version;

pub use cache::XaCache;
pub use command::WriteCommand;
pub use config::ResourceConfig;
pub use context::TransactionContext;
pub use resource::{BranchState, CacheXaResource, PrepareOutcome};
pub use version::{Version, VersionTable};
