//! Concurrent/multi-threaded tests for txcache-resource
//!
//! These tests verify behavior under actual concurrent execution:
//!
//! 1. **Idempotent context creation** - racing first accesses share one context
//! 2. **First-committer-wins** - a later prepare observes an earlier commit
//! 3. **Disjoint keys** - unrelated transactions never disturb each other
//! 4. **Stress** - contended keys under load leave no bookkeeping behind

use rand::Rng;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use txcache_core::{CacheKey, Element, Gtrid, Store, TransactionManager, TxnHandle, Value, XaFlags};
use txcache_resource::testing::MockTransactionManager;
use txcache_resource::{CacheXaResource, XaCache};
use txcache_storage::MemoryStore;

// ============================================================================
// Test Helpers
// ============================================================================

fn setup() -> (
    Arc<CacheXaResource>,
    Arc<MemoryStore>,
    Arc<MockTransactionManager>,
) {
    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(MockTransactionManager::new());
    let resource = Arc::new(CacheXaResource::new(
        "concurrent",
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&manager) as Arc<dyn TransactionManager>,
    ));
    (resource, store, manager)
}

fn gtrid_for(handle: TxnHandle) -> Gtrid {
    Gtrid::new(1, handle.raw().to_be_bytes().to_vec(), vec![1])
}

// ============================================================================
// SECTION 1: Idempotent context creation
// ============================================================================

/// Racing first accesses for the same transaction handle must all end up
/// with the same shared context instance.
#[test]
fn concurrent_first_access_yields_single_context() {
    let (resource, _, manager) = setup();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handle = TxnHandle::new(42);

    let join_handles: Vec<_> = (0..threads)
        .map(|_| {
            let resource = Arc::clone(&resource);
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                manager.bind(handle);
                barrier.wait();
                let context = resource.get_or_create_transaction_context().unwrap();
                Arc::as_ptr(&context) as usize
            })
        })
        .collect();

    let pointers: Vec<usize> = join_handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect();

    assert!(pointers.windows(2).all(|w| w[0] == w[1]));

    // Every enlistment that raced through names the same transaction.
    let enlistments = manager.enlistments();
    assert!(!enlistments.is_empty());
    assert!(enlistments.iter().all(|(txn, name)| {
        *txn == handle && name == "concurrent"
    }));
}

// ============================================================================
// SECTION 2: First-committer-wins
// ============================================================================

/// Both transactions check the same key out before either commits; the one
/// that commits first wins and the other fails validation at prepare.
#[test]
fn later_prepare_observes_earlier_commit() {
    let (resource, store, manager) = setup();
    let checkout_done = Arc::new(Barrier::new(2));
    let first_committed = Arc::new(Barrier::new(2));

    let winner = {
        let resource = Arc::clone(&resource);
        let manager = Arc::clone(&manager);
        let checkout_done = Arc::clone(&checkout_done);
        let first_committed = Arc::clone(&first_committed);
        thread::spawn(move || {
            let handle = TxnHandle::new(1);
            let gtrid = gtrid_for(handle);
            manager.bind(handle);
            resource.start(&gtrid, XaFlags::NONE).unwrap();
            let cache = XaCache::new(Arc::clone(&resource));
            cache.put(Element::new("contested", Value::Int(1))).unwrap();

            checkout_done.wait();

            resource.end(&gtrid, XaFlags::SUCCESS).unwrap();
            resource.prepare(&gtrid).unwrap();
            resource.commit(&gtrid, false).unwrap();

            first_committed.wait();
        })
    };

    let loser = {
        let resource = Arc::clone(&resource);
        let manager = Arc::clone(&manager);
        let checkout_done = Arc::clone(&checkout_done);
        let first_committed = Arc::clone(&first_committed);
        thread::spawn(move || {
            let handle = TxnHandle::new(2);
            let gtrid = gtrid_for(handle);
            manager.bind(handle);
            resource.start(&gtrid, XaFlags::NONE).unwrap();
            let cache = XaCache::new(Arc::clone(&resource));
            cache.put(Element::new("contested", Value::Int(2))).unwrap();

            checkout_done.wait();
            first_committed.wait();

            resource.end(&gtrid, XaFlags::SUCCESS).unwrap();
            let err = resource.prepare(&gtrid).unwrap_err();
            assert!(err.is_version_conflict());
            resource.rollback(&gtrid).unwrap();
        })
    };

    winner.join().unwrap();
    loser.join().unwrap();

    assert_eq!(
        store.get(&CacheKey::from("contested")).unwrap().unwrap().value,
        Value::Int(1)
    );
    assert!(resource.version_table().is_empty());
}

// ============================================================================
// SECTION 3: Disjoint keys never contend
// ============================================================================

#[test]
fn disjoint_transactions_all_commit() {
    let (resource, store, manager) = setup();
    let threads = 8;
    let writes_per_thread = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let join_handles: Vec<_> = (0..threads)
        .map(|t| {
            let resource = Arc::clone(&resource);
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let handle = TxnHandle::new(t as u64 + 1);
                let gtrid = gtrid_for(handle);
                manager.bind(handle);
                barrier.wait();

                resource.start(&gtrid, XaFlags::NONE).unwrap();
                let cache = XaCache::new(Arc::clone(&resource));
                for i in 0..writes_per_thread {
                    cache
                        .put(Element::new(
                            format!("thread-{t}/key-{i}"),
                            Value::Int(i as i64),
                        ))
                        .unwrap();
                }
                resource.end(&gtrid, XaFlags::SUCCESS).unwrap();
                resource.prepare(&gtrid).unwrap();
                resource.commit(&gtrid, false).unwrap();
            })
        })
        .collect();

    for handle in join_handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), threads * writes_per_thread);
    assert!(resource.version_table().is_empty());
}

// ============================================================================
// SECTION 4: Contended stress
// ============================================================================

/// Transactions hammer a small pool of keys, committing when prepare allows
/// and rolling back otherwise. However the races fall, every piece of
/// bookkeeping must drain.
#[test]
fn contended_stress_leaves_no_bookkeeping() {
    let (resource, _store, manager) = setup();
    let threads = 8;
    let iterations = 50;
    let next_handle = Arc::new(AtomicU64::new(1));
    let commits = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));

    let join_handles: Vec<_> = (0..threads)
        .map(|_| {
            let resource = Arc::clone(&resource);
            let manager = Arc::clone(&manager);
            let next_handle = Arc::clone(&next_handle);
            let commits = Arc::clone(&commits);
            let conflicts = Arc::clone(&conflicts);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..iterations {
                    let handle = TxnHandle::new(next_handle.fetch_add(1, Ordering::SeqCst));
                    let gtrid = gtrid_for(handle);
                    manager.bind(handle);

                    resource.start(&gtrid, XaFlags::NONE).unwrap();
                    let cache = XaCache::new(Arc::clone(&resource));
                    let key = format!("hot-{}", rng.gen_range(0..4));
                    cache
                        .put(Element::new(key, Value::Int(rng.gen_range(0..1000))))
                        .unwrap();
                    resource.end(&gtrid, XaFlags::SUCCESS).unwrap();

                    match resource.prepare(&gtrid) {
                        Ok(_) => match resource.commit(&gtrid, false) {
                            Ok(()) => {
                                commits.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(_) => {
                                resource.rollback(&gtrid).unwrap();
                            }
                        },
                        Err(err) => {
                            assert!(err.is_version_conflict());
                            conflicts.fetch_add(1, Ordering::SeqCst);
                            resource.rollback(&gtrid).unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in join_handles {
        handle.join().unwrap();
    }

    // Every transaction either committed or conflicted and rolled back.
    assert_eq!(
        commits.load(Ordering::SeqCst) + conflicts.load(Ordering::SeqCst),
        threads * iterations
    );
    assert!(commits.load(Ordering::SeqCst) > 0);
    // All checkouts drained: the version table is back to empty.
    assert!(resource.version_table().is_empty());
}
