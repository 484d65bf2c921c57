//! txcache - XA-style transactional resource for a cache engine
//!
//! txcache lets a cache participate in a distributed transaction driven by an
//! external transaction manager: writes performed under a transaction are
//! buffered per transaction, validated against per-key optimistic versions at
//! prepare, and applied to the backing store atomically at commit — or
//! discarded wholesale at rollback.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use txcache::{CacheXaResource, Element, Gtrid, MemoryStore, Value, XaCache, XaFlags};
//!
//! let store = Arc::new(MemoryStore::new());
//! let resource = Arc::new(CacheXaResource::new("users", store, txn_manager));
//! let cache = XaCache::new(Arc::clone(&resource));
//!
//! // Driven by the transaction manager:
//! resource.start(&gtrid, XaFlags::NONE)?;
//! cache.put(Element::new("user:1", Value::Str("Alice".into())))?;
//! resource.end(&gtrid, XaFlags::SUCCESS)?;
//! resource.prepare(&gtrid)?;
//! resource.commit(&gtrid, false)?;
//! ```
//!
//! # Architecture
//!
//! [`CacheXaResource`] owns the protocol state machine, the per-transaction
//! [`TransactionContext`] buffers and the [`VersionTable`]; [`XaCache`] is the
//! caller-facing surface that routes writes through version checkout into the
//! buffer. The backing [`Store`] and the [`TransactionManager`] are supplied
//! by the embedder.

pub use txcache_core::{
    CacheKey, Element, Gtrid, Store, TransactionManager, TxnHandle, Value, XaError, XaFlags,
    XaResult,
};
pub use txcache_resource::{
    BranchState, CacheXaResource, PrepareOutcome, ResourceConfig, TransactionContext, VersionTable,
    WriteCommand, XaCache,
};
pub use txcache_storage::MemoryStore;
