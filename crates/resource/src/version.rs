//! Optimistic concurrency control: per-key versions and the version table
//!
//! Every cache key a transaction writes is stamped with a version. A
//! transaction records the version it observed when it checked the key out;
//! at prepare time the coordinator asks whether that observation still holds.
//! Committing a write publishes a new version by incrementing the key's
//! counter at checkin.
//!
//! Versions are per-key, not per-cache: transactions touching disjoint keys
//! never contend. The table is bounded to keys with at least one in-flight
//! transaction — the last checkin removes the entry, and an absent entry is
//! indistinguishable from a key that was never touched.

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txcache_core::{CacheKey, TxnHandle};

/// Version state for a single cache key.
///
/// Holds the committed-version counter (starts at 0, +1 per committing
/// checkin) and the map from in-flight transaction to the counter value it
/// observed at checkout.
///
/// Invariant: a recorded observation is always ≤ the committed counter at the
/// moment it was recorded; the counter never decreases within the lifetime of
/// one `Version`.
#[derive(Debug, Default)]
pub struct Version {
    committed: AtomicU64,
    checkouts: Mutex<FxHashMap<TxnHandle, u64>>,
}

impl Version {
    /// Create a fresh version with counter 0 and no checkouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current committed counter.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::SeqCst)
    }

    /// Record `txn`'s observation of the current counter and return it.
    ///
    /// A second checkout by the same transaction overwrites the earlier
    /// observation: last checkout wins.
    pub fn checkout(&self, txn: TxnHandle) -> u64 {
        let mut checkouts = self.checkouts.lock();
        let current = self.committed.load(Ordering::SeqCst);
        checkouts.insert(txn, current);
        current
    }

    /// The counter value `txn` observed at checkout, if it holds one.
    pub fn observed_by(&self, txn: TxnHandle) -> Option<u64> {
        self.checkouts.lock().get(&txn).copied()
    }

    /// True when `txn`'s observation still equals the committed counter.
    ///
    /// A transaction with no recorded checkout cannot be proven current and
    /// reads as stale.
    pub fn is_current(&self, txn: TxnHandle) -> bool {
        let checkouts = self.checkouts.lock();
        match checkouts.get(&txn) {
            Some(observed) => *observed == self.committed.load(Ordering::SeqCst),
            None => false,
        }
    }

    /// Release `txn`'s checkout without publishing a new version.
    ///
    /// Returns true when no checkouts remain.
    pub fn checkin_read(&self, txn: TxnHandle) -> bool {
        let mut checkouts = self.checkouts.lock();
        checkouts.remove(&txn);
        checkouts.is_empty()
    }

    /// Release `txn`'s checkout and publish a new version (+1 on the
    /// counter).
    ///
    /// Returns true when no checkouts remain.
    pub fn checkin_write(&self, txn: TxnHandle) -> bool {
        let mut checkouts = self.checkouts.lock();
        checkouts.remove(&txn);
        self.committed.fetch_add(1, Ordering::SeqCst);
        checkouts.is_empty()
    }

    /// True while any transaction holds a checkout.
    pub fn has_checkouts(&self) -> bool {
        !self.checkouts.lock().is_empty()
    }
}

/// Registry mapping cache key → [`Version`].
///
/// Entries are created lazily on first checkout and removed once the last
/// checkout releases, so memory is bounded by the number of keys with an
/// in-flight transaction.
#[derive(Debug, Default)]
pub struct VersionTable {
    versions: DashMap<CacheKey, Arc<Version>>,
}

impl VersionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a version exists for `key`, record `txn`'s observation of its
    /// counter, and return the observed value.
    pub fn checkout(&self, key: &CacheKey, txn: TxnHandle) -> u64 {
        let entry = self
            .versions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Version::new()));
        // Recording under the entry guard keeps a concurrent removal of this
        // key from dropping the checkout.
        entry.checkout(txn)
    }

    /// Whether `txn`'s observation of `key` still holds.
    ///
    /// An absent entry means no concurrent transaction is tracking the key
    /// and validates as true.
    pub fn valid(&self, key: &CacheKey, txn: TxnHandle) -> bool {
        match self.versions.get(key) {
            Some(version) => version.is_current(txn),
            None => true,
        }
    }

    /// Release `txn`'s checkout on `key`; a non-read-only checkin publishes
    /// the new committed version. Removes the key's entry once no checkouts
    /// remain. No-op for an untracked key.
    pub fn checkin(&self, key: &CacheKey, txn: TxnHandle, read_only: bool) {
        let Some(version) = self.versions.get(key).map(|entry| Arc::clone(&entry)) else {
            return;
        };
        let now_empty = if read_only {
            version.checkin_read(txn)
        } else {
            version.checkin_write(txn)
        };
        if now_empty {
            // Re-checked under the shard lock: a checkout may have raced in
            // since `now_empty` was computed.
            self.versions.remove_if(key, |_, version| !version.has_checkouts());
        }
    }

    /// Committed counter for `key`, if tracked.
    pub fn committed_version(&self, key: &CacheKey) -> Option<u64> {
        self.versions.get(key).map(|version| version.committed())
    }

    /// True while `key` has an entry.
    pub fn is_tracked(&self, key: &CacheKey) -> bool {
        self.versions.contains_key(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// True when no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    fn key(name: &str) -> CacheKey {
        CacheKey::from(name)
    }

    #[test]
    fn checkout_returns_current_counter() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);

        assert_eq!(table.checkout(&key("a"), t1), 0);
        assert_eq!(table.committed_version(&key("a")), Some(0));
    }

    #[test]
    fn recheckout_overwrites_prior_observation() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);
        let t2 = TxnHandle::new(2);

        assert_eq!(table.checkout(&key("a"), t1), 0);
        assert_eq!(table.checkout(&key("a"), t2), 0);

        // t2 publishes a new version; t1's observation is now stale.
        table.checkin(&key("a"), t2, false);
        assert!(!table.valid(&key("a"), t1));

        // Last checkout wins: re-checking out refreshes the observation.
        assert_eq!(table.checkout(&key("a"), t1), 1);
        assert!(table.valid(&key("a"), t1));
    }

    #[test]
    fn untracked_key_is_valid() {
        let table = VersionTable::new();
        assert!(table.valid(&key("never-touched"), TxnHandle::new(1)));
    }

    #[test]
    fn concurrent_committer_invalidates_observation() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);
        let t2 = TxnHandle::new(2);

        table.checkout(&key("a"), t1);
        table.checkout(&key("a"), t2);
        assert!(table.valid(&key("a"), t1));

        table.checkin(&key("a"), t2, false);

        assert!(!table.valid(&key("a"), t1));
        assert_eq!(table.committed_version(&key("a")), Some(1));
    }

    #[test]
    fn read_only_checkin_does_not_publish() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);
        let t2 = TxnHandle::new(2);

        table.checkout(&key("a"), t1);
        table.checkout(&key("a"), t2);

        table.checkin(&key("a"), t2, true);
        assert!(table.valid(&key("a"), t1));
        assert_eq!(table.committed_version(&key("a")), Some(0));
    }

    #[test]
    fn last_checkin_removes_entry() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);
        let t2 = TxnHandle::new(2);

        table.checkout(&key("a"), t1);
        table.checkout(&key("a"), t2);

        table.checkin(&key("a"), t1, false);
        assert!(table.is_tracked(&key("a")));

        table.checkin(&key("a"), t2, true);
        assert!(!table.is_tracked(&key("a")));
        assert!(table.is_empty());
    }

    #[test]
    fn checkin_of_untracked_key_is_noop() {
        let table = VersionTable::new();
        table.checkin(&key("a"), TxnHandle::new(1), false);
        assert!(table.is_empty());
    }

    #[test]
    fn counter_increments_once_per_committing_checkin() {
        let table = VersionTable::new();
        let pin = TxnHandle::new(0);
        table.checkout(&key("a"), pin);

        for i in 1..=5u64 {
            let txn = TxnHandle::new(i);
            table.checkout(&key("a"), txn);
            table.checkin(&key("a"), txn, false);
            assert_eq!(table.committed_version(&key("a")), Some(i));
        }

        table.checkin(&key("a"), pin, true);
    }

    #[test]
    fn disjoint_keys_never_interfere() {
        let table = VersionTable::new();
        let t1 = TxnHandle::new(1);
        let t2 = TxnHandle::new(2);

        table.checkout(&key("a"), t1);
        table.checkout(&key("b"), t2);
        table.checkin(&key("b"), t2, false);

        assert!(table.valid(&key("a"), t1));
        assert_eq!(table.committed_version(&key("a")), Some(0));
    }

    #[test]
    fn concurrent_checkouts_on_same_key_all_record() {
        let table = Arc::new(VersionTable::new());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let txn = TxnHandle::new(i as u64);
                    barrier.wait();
                    let observed = table.checkout(&CacheKey::from("hot"), txn);
                    assert_eq!(observed, 0);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // Every transaction is still valid; releasing them all empties the table.
        for i in 0..threads {
            assert!(table.valid(&CacheKey::from("hot"), TxnHandle::new(i as u64)));
        }
        for i in 0..threads {
            table.checkin(&CacheKey::from("hot"), TxnHandle::new(i as u64), true);
        }
        assert!(table.is_empty());
    }
}
