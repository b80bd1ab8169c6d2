//! ConcurrentTable Tests
//!
//! Tests verify:
//! - Single-threaded behaviour matches the store
//! - Compound operations (update / upsert / with_exclusive)
//! - No lost updates under concurrent increments
//! - Mixed concurrent operations leave a consistent table
//! - Concurrent clear
//! - Read guards hold off writers
//! - Nested reads proceed while a writer is queued
//! - Poisoning after a panic in an exclusive section

use std::collections::HashSet;
use std::hash::{BuildHasherDefault, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use chaintable::{BucketStore, ConcurrentTable, TableConfig, TableError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Default)]
struct ZeroHasher;

impl Hasher for ZeroHasher {
    fn finish(&self) -> u64 {
        0
    }

    fn write(&mut self, _bytes: &[u8]) {}
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_table_is_empty() {
    let table: ConcurrentTable<String, i32> = ConcurrentTable::new();
    assert_eq!(table.count().unwrap(), 0);
    assert!(table.is_empty().unwrap());
    assert!(table.items().unwrap().is_empty());
    assert_eq!(table.to_string(), "{}");
    assert_eq!(table.bucket_count(), 100);
}

#[test]
fn test_set_get_contains() {
    let table = ConcurrentTable::new();
    table.set("a", 1).unwrap();
    table.set("b", 2).unwrap();

    assert_eq!(table.get("a"), Ok(1));
    assert_eq!(table.get("b"), Ok(2));
    assert!(table.contains("a").unwrap());
    assert!(!table.contains("z").unwrap());
    assert_eq!(table.len().unwrap(), 2);
}

#[test]
fn test_overwrite_and_delete() {
    let table = ConcurrentTable::new();
    table.set("x", 10).unwrap();
    assert_eq!(table.set("x", 99), Ok(Some(10)));
    assert_eq!(table.get("x"), Ok(99));

    assert_eq!(table.delete("x"), Ok(99));
    assert!(!table.contains("x").unwrap());
    assert_eq!(table.get("x"), Err(TableError::KeyNotFound));
    assert_eq!(table.delete("x"), Err(TableError::KeyNotFound));
}

#[test]
fn test_get_with_avoids_clone() {
    let table = ConcurrentTable::new();
    table.set("name", String::from("chaintable")).unwrap();

    assert_eq!(table.get_with("name", |s| s.len()), Ok(10));
    assert_eq!(table.get_with("other", |s| s.len()), Err(TableError::KeyNotFound));
}

#[test]
fn test_snapshots() {
    let table = ConcurrentTable::new();
    for (k, v) in [("x", 1), ("y", 2), ("z", 3)] {
        table.set(k, v).unwrap();
    }

    let keys: HashSet<_> = table.keys().unwrap().into_iter().collect();
    let values: HashSet<_> = table.values().unwrap().into_iter().collect();
    let items: HashSet<_> = table.items().unwrap().into_iter().collect();

    assert_eq!(keys, HashSet::from(["x", "y", "z"]));
    assert_eq!(values, HashSet::from([1, 2, 3]));
    assert_eq!(items, HashSet::from([("x", 1), ("y", 2), ("z", 3)]));
}

#[test]
fn test_snapshot_is_detached() {
    let table = ConcurrentTable::new();
    table.set("key", "value").unwrap();

    let items = table.items().unwrap();
    table.set("key", "modified").unwrap();

    assert_eq!(items, vec![("key", "value")]);
}

#[test]
fn test_clear() {
    let table = ConcurrentTable::new();
    for i in 0..5 {
        table.set(i, i * 10).unwrap();
    }
    table.clear().unwrap();

    assert_eq!(table.count().unwrap(), 0);
    assert!(table.keys().unwrap().is_empty());
    assert!(table.values().unwrap().is_empty());
}

#[test]
fn test_from_config_and_into_inner() {
    let config = TableConfig::builder().bucket_count(8).build();
    let table = ConcurrentTable::from_config(&config).unwrap();
    table.set(1, "one").unwrap();

    let store = table.into_inner().unwrap();
    assert_eq!(store.bucket_count(), 8);
    assert_eq!(store.get(&1), Ok(&"one"));
}

#[test]
fn test_from_config_rejects_zero_buckets() {
    let config = TableConfig::builder().bucket_count(0).build();
    let result = ConcurrentTable::<i32, i32>::from_config(&config);
    assert!(matches!(result, Err(TableError::Config(_))));
}

#[test]
fn test_from_store() {
    let mut store = BucketStore::new();
    store.set("a", 1);

    let table = ConcurrentTable::from(store);
    assert_eq!(table.get("a"), Ok(1));
}

#[test]
fn test_display_and_debug() {
    let table = ConcurrentTable::with_hasher(4, BuildHasherDefault::<ZeroHasher>::default());
    table.set("alpha", 1).unwrap();
    table.set("beta", 2).unwrap();

    assert_eq!(table.to_string(), "{alpha: 1, beta: 2}");

    let debug = format!("{:?}", table);
    assert!(debug.contains("bucket_count: 4"));
    assert!(debug.contains("len: 2"));
    assert!(debug.contains("poisoned: false"));
}

#[test]
fn test_collision_resolution_through_guard() {
    let table = ConcurrentTable::with_hasher(2, BuildHasherDefault::<ZeroHasher>::default());
    table.set("k1", 100).unwrap();
    table.set("k2", 200).unwrap();
    table.set("k3", 300).unwrap();
    assert_eq!(table.count().unwrap(), 3);

    table.delete("k2").unwrap();
    assert_eq!(table.get("k1"), Ok(100));
    assert_eq!(table.get("k3"), Ok(300));
    assert_eq!(table.stats().unwrap().longest_chain, 2);
}

// =============================================================================
// Compound Operation Tests
// =============================================================================

#[test]
fn test_update_existing() {
    let table = ConcurrentTable::new();
    table.set("n", 1).unwrap();

    let doubled = table.update("n", |v| {
        *v *= 2;
        *v
    });
    assert_eq!(doubled, Ok(2));
    assert_eq!(table.get("n"), Ok(2));
}

#[test]
fn test_update_missing_skips_closure() {
    let table: ConcurrentTable<&str, i32> = ConcurrentTable::new();
    let mut called = false;

    let result = table.update("n", |_| called = true);
    assert_eq!(result, Err(TableError::KeyNotFound));
    assert!(!called);
    assert!(!table.contains("n").unwrap());
}

#[test]
fn test_upsert_inserts_then_updates() {
    let table = ConcurrentTable::new();

    assert_eq!(table.upsert("hits", || 0, |n| { *n += 1; *n }), Ok(1));
    assert_eq!(table.upsert("hits", || 0, |n| { *n += 1; *n }), Ok(2));
    assert_eq!(table.count().unwrap(), 1);
}

#[test]
fn test_with_exclusive_moves_value() {
    let table = ConcurrentTable::new();
    table.set("from", 10).unwrap();

    table
        .with_exclusive(|store| -> chaintable::Result<()> {
            let value = store.delete("from")?;
            store.set("to", value);
            Ok(())
        })
        .unwrap()
        .unwrap();

    assert!(!table.contains("from").unwrap());
    assert_eq!(table.get("to"), Ok(10));
}

#[test]
fn test_with_shared_lazy_traversal() {
    let table = ConcurrentTable::new();
    for i in 1..=4 {
        table.set(i, i).unwrap();
    }

    let total: i32 = table.with_shared(|store| store.values().sum()).unwrap();
    assert_eq!(total, 10);

    let guard = table.read().unwrap();
    assert_eq!(guard.iter().count(), 4);
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_table_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConcurrentTable<String, u64>>();
}

#[test]
fn test_parallel_increment_consistency() {
    let table: Arc<ConcurrentTable<String, u32>> = Arc::new(ConcurrentTable::new());
    let mut handles = vec![];

    for i in 0..5 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let key = format!("counter_{}", i);
            for _ in 0..100 {
                table.upsert(key.clone(), || 0, |n| *n += 1).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..5 {
        assert_eq!(table.get(format!("counter_{}", i).as_str()), Ok(100));
    }
}

#[test]
fn test_shared_counter_no_lost_updates() {
    const WORKERS: u64 = 8;
    let table = Arc::new(ConcurrentTable::new());
    let barrier = Arc::new(Barrier::new(WORKERS as usize));
    let mut handles = vec![];

    for _ in 0..WORKERS {
        let table = Arc::clone(&table);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..100 {
                table.upsert("counter", || 0u64, |n| *n += 1).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.get("counter"), Ok(100 * WORKERS));
}

#[test]
fn test_update_based_increment() {
    let table = Arc::new(ConcurrentTable::new());
    table.set("counter", 0u64).unwrap();
    let mut handles = vec![];

    for _ in 0..4 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            for _ in 0..250 {
                table.update("counter", |n| *n += 1).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.get("counter"), Ok(1000));
}

#[test]
fn test_parallel_mixed_operations() {
    let table = Arc::new(ConcurrentTable::new());
    for i in 0..20u64 {
        table.set(i, i).unwrap();
    }

    let mut handles = vec![];
    for id in 0..8u64 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(id);
            for _ in 0..50 {
                let key = rng.gen_range(0..=30u64);
                match rng.gen_range(0..3) {
                    0 => {
                        table.set(key, id).unwrap();
                    }
                    1 => {
                        let _ = table.get(&key).ok();
                    }
                    _ => match table.delete(&key) {
                        Ok(_) | Err(TableError::KeyNotFound) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    },
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let items = table.items().unwrap();
    assert_eq!(items.len(), table.count().unwrap());
    assert!(items.iter().all(|(k, _)| *k <= 30));

    let unique: HashSet<_> = items.iter().map(|(k, _)| *k).collect();
    assert_eq!(unique.len(), items.len());

    for i in 0..30u64 {
        let _ = table.get(&i).ok();
    }
}

#[test]
fn test_parallel_clear() {
    let table = Arc::new(ConcurrentTable::new());
    for i in 0..50 {
        table.set(i, i).unwrap();
    }

    let mut handles = vec![];
    for _ in 0..3 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || table.clear().unwrap()));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(table.count().unwrap(), 0);
}

#[test]
fn test_clear_never_observed_half_empty() {
    let table = Arc::new(ConcurrentTable::<i32, i32>::with_bucket_count(16));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let table = Arc::clone(&table);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for _ in 0..200 {
                table
                    .with_exclusive(|store| {
                        for i in 0..64 {
                            store.set(i, i);
                        }
                    })
                    .unwrap();
                table.clear().unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    let reader = {
        let table = Arc::clone(&table);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let count = table.count().unwrap();
                assert!(count == 0 || count == 64, "observed torn count {}", count);

                let seen = table.with_shared(|store| store.iter().count()).unwrap();
                assert!(seen == 0 || seen == 64, "observed torn traversal {}", seen);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}

#[test]
fn test_concurrent_reads() {
    let table = Arc::new(ConcurrentTable::new());
    table.set("key", "value").unwrap();
    let mut handles = vec![];

    for _ in 0..10 {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            for _ in 0..100 {
                assert_eq!(table.get("key"), Ok("value"));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_read_guard_holds_off_writers() {
    let table = Arc::new(ConcurrentTable::new());
    table.set("k", 1).unwrap();
    let wrote = Arc::new(AtomicBool::new(false));

    let guard = table.read().unwrap();

    let writer = {
        let table = Arc::clone(&table);
        let wrote = Arc::clone(&wrote);
        thread::spawn(move || {
            table.set("k", 2).unwrap();
            wrote.store(true, Ordering::Release);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!wrote.load(Ordering::Acquire));
    assert_eq!(guard.get("k"), Ok(&1));
    drop(guard);

    writer.join().unwrap();
    assert!(wrote.load(Ordering::Acquire));
    assert_eq!(table.get("k"), Ok(2));
}

#[test]
fn test_nested_read_while_writer_queued() {
    let table = Arc::new(ConcurrentTable::new());
    for i in 0..10u64 {
        table.set(i, i).unwrap();
    }

    let guard = table.read().unwrap();

    let writer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            table.set(99, 0).unwrap();
        })
    };
    thread::sleep(Duration::from_millis(100));

    // Each contains re-enters the shared lock with the writer parked
    let found = guard.keys().filter(|k| table.contains(*k).unwrap()).count();
    assert_eq!(found, 10);
    assert_eq!(table.to_string().matches(':').count(), 10);
    drop(guard);

    writer.join().unwrap();
    assert_eq!(table.get(&99), Ok(0));
}

// =============================================================================
// Poisoning Tests
// =============================================================================

#[test]
fn test_panic_in_exclusive_section_poisons() {
    let table = ConcurrentTable::new();
    table.set("a", 1).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = table.with_exclusive(|store| {
            store.set("b", 2);
            panic!("worker died mid-update");
        });
    }));
    assert!(result.is_err());

    assert!(table.is_poisoned());
    assert!(table.get("a").unwrap_err().is_fatal());
    assert!(matches!(table.set("c", 3), Err(TableError::GuardFailure(_))));
    assert!(matches!(table.count(), Err(TableError::GuardFailure(_))));
    assert!(matches!(table.clear(), Err(TableError::GuardFailure(_))));
    assert!(table.read().is_err());
    assert!(table.into_inner().is_err());
}

#[test]
fn test_panic_in_upsert_poisons_across_threads() {
    let table: Arc<ConcurrentTable<&str, i32>> = Arc::new(ConcurrentTable::new());

    let crashed = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            let _ = table.upsert("counter", || 0, |_: &mut i32| -> i32 {
                panic!("crash while holding exclusive access")
            });
        })
    };
    assert!(crashed.join().is_err());

    assert!(table.is_poisoned());
    assert_eq!(table.to_string(), "{<poisoned>}");
    assert!(matches!(table.get("counter"), Err(TableError::GuardFailure(_))));
}

#[test]
fn test_panic_in_shared_section_does_not_poison() {
    let table = ConcurrentTable::new();
    table.set("a", 1).unwrap();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = table.get_with("a", |_: &i32| -> i32 { panic!("reader failed") });
    }));
    assert!(result.is_err());

    assert!(!table.is_poisoned());
    assert_eq!(table.get("a"), Ok(1));
}
