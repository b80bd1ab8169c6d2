//! ConcurrentTable implementation
//!
//! BucketStore behind a parking_lot RwLock.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use parking_lot::{RwLock, RwLockReadGuard};

use crate::config::{TableConfig, DEFAULT_BUCKET_COUNT};
use crate::error::Result;
use crate::stats::TableStats;
use crate::store::BucketStore;

use super::poison::PoisonFlag;

/// Shared read access to the underlying store
///
/// Mutations from every thread wait until it is dropped. Reads
/// (including `Display`) may be nested under it, even with a writer
/// queued; calling a mutating method on the same table while holding
/// one deadlocks.
pub type ReadGuard<'a, K, V, S = RandomState> = RwLockReadGuard<'a, BucketStore<K, V, S>>;

/// Thread-safe chained hash table
///
/// ## Concurrency Model: Multiple-Reader / Single-Writer
///
/// - **Reads** (`get`, `contains`, `count`, snapshots, `read`): shared lock,
///   run concurrently with each other
/// - **Writes** (`set`, `delete`, `clear`, `update`, `upsert`,
///   `with_exclusive`): exclusive lock, never observed half-applied
///
/// A `get` followed by a `set` is two acquisitions and can lose updates
/// under contention. Read-modify-write sequences belong in one
/// [`upsert`](Self::upsert), [`update`](Self::update) or
/// [`with_exclusive`](Self::with_exclusive) call.
///
/// If a closure panics while the exclusive lock is held, the table is
/// poisoned: every later operation fails with `GuardFailure` and the
/// table must be discarded.
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use chaintable::ConcurrentTable;
///
/// let table = Arc::new(ConcurrentTable::new());
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let table = Arc::clone(&table);
///         thread::spawn(move || {
///             for _ in 0..100 {
///                 table.upsert("hits", || 0u32, |n| *n += 1).unwrap();
///             }
///         })
///     })
///     .collect();
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(table.get("hits").unwrap(), 400);
/// ```
pub struct ConcurrentTable<K, V, S = RandomState> {
    /// The only shared mutable state
    store: RwLock<BucketStore<K, V, S>>,

    /// Copied out of the store; immutable, so readable without locking
    bucket_count: usize,

    /// Set by a panic inside an exclusive section
    poison: PoisonFlag,
}

impl<K, V> ConcurrentTable<K, V, RandomState> {
    /// Create an empty table with the default 100 buckets
    pub fn new() -> Self {
        Self::with_bucket_count(DEFAULT_BUCKET_COUNT)
    }

    /// Create an empty table with `bucket_count` buckets
    ///
    /// # Panics
    /// If `bucket_count` is 0.
    pub fn with_bucket_count(bucket_count: usize) -> Self {
        Self::from_store(BucketStore::with_bucket_count(bucket_count))
    }

    /// Create an empty table from a validated config
    pub fn from_config(config: &TableConfig) -> Result<Self> {
        BucketStore::from_config(config).map(Self::from_store)
    }
}

impl<K, V, S> ConcurrentTable<K, V, S> {
    /// Create an empty table that hashes keys with `hash_builder`
    ///
    /// # Panics
    /// If `bucket_count` is 0.
    pub fn with_hasher(bucket_count: usize, hash_builder: S) -> Self {
        Self::from_store(BucketStore::with_hasher(bucket_count, hash_builder))
    }

    /// Put an existing store behind the guard
    pub fn from_store(store: BucketStore<K, V, S>) -> Self {
        Self {
            bucket_count: store.bucket_count(),
            store: RwLock::new(store),
            poison: PoisonFlag::new(),
        }
    }

    /// Take the store back out; fails if the table is poisoned
    pub fn into_inner(self) -> Result<BucketStore<K, V, S>> {
        self.poison.check()?;
        Ok(self.store.into_inner())
    }

    /// Number of buckets (fixed)
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// True once a panic has escaped an exclusive section
    pub fn is_poisoned(&self) -> bool {
        self.poison.is_poisoned()
    }

    // =========================================================================
    // Guard Primitives
    // =========================================================================

    /// Run `f` under shared access
    ///
    /// Recursive so a thread already reading can read again while a
    /// writer is queued.
    fn shared<R>(&self, f: impl FnOnce(&BucketStore<K, V, S>) -> R) -> Result<R> {
        let store = self.store.read_recursive();
        self.poison.check()?;
        Ok(f(&store))
    }

    /// Run `f` under exclusive access
    fn exclusive<R>(&self, f: impl FnOnce(&mut BucketStore<K, V, S>) -> R) -> Result<R> {
        let mut store = self.store.write();
        self.poison.check()?;

        // Declared after the write guard so it drops while the lock is held
        let _sentinel = self.poison.sentinel();
        Ok(f(&mut store))
    }

    /// Hold shared access for lazy traversal
    ///
    /// ```
    /// # use chaintable::ConcurrentTable;
    /// let table = ConcurrentTable::new();
    /// table.set("a", 1).unwrap();
    /// let total: i32 = table.read().unwrap().values().sum();
    /// assert_eq!(total, 1);
    /// ```
    pub fn read(&self) -> Result<ReadGuard<'_, K, V, S>> {
        let store = self.store.read_recursive();
        self.poison.check()?;
        Ok(store)
    }

    /// Run `f` against the store under one shared acquisition
    pub fn with_shared<R>(&self, f: impl FnOnce(&BucketStore<K, V, S>) -> R) -> Result<R> {
        self.shared(f)
    }

    /// Run `f` against the store under one exclusive acquisition
    ///
    /// The general compound primitive: everything `f` does is atomic with
    /// respect to every other operation on this table.
    ///
    /// `f` must work through the store it is handed. Calling back into
    /// this table from inside `f`, including formatting it with
    /// `Display`, deadlocks the calling thread.
    pub fn with_exclusive<R>(&self, f: impl FnOnce(&mut BucketStore<K, V, S>) -> R) -> Result<R> {
        self.exclusive(f)
    }

    // =========================================================================
    // Whole-table Operations
    // =========================================================================

    /// Total number of entries
    pub fn count(&self) -> Result<usize> {
        self.shared(BucketStore::count)
    }

    /// Alias of [`ConcurrentTable::count`]
    pub fn len(&self) -> Result<usize> {
        self.count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.shared(BucketStore::is_empty)
    }

    /// Empty every bucket in one exclusive step
    pub fn clear(&self) -> Result<()> {
        self.exclusive(BucketStore::clear)
    }

    /// Chain-length diagnostics
    pub fn stats(&self) -> Result<TableStats> {
        self.shared(BucketStore::stats)
    }
}

impl<K, V, S> ConcurrentTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    // =========================================================================
    // Reads
    // =========================================================================

    /// Clone of the value for `key`, or `KeyNotFound`
    pub fn get<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.shared(|store| store.get(key).cloned())?
    }

    /// Apply `f` to the value for `key` without cloning it
    pub fn get_with<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Result<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared(|store| store.get(key).map(f))?
    }

    pub fn contains<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.shared(|store| store.contains(key))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or overwrite; returns the previous value on overwrite
    pub fn set(&self, key: K, value: V) -> Result<Option<V>> {
        self.exclusive(|store| store.set(key, value))
    }

    /// Remove `key` and return its value, or `KeyNotFound`
    pub fn delete<Q>(&self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.exclusive(|store| store.delete(key))?
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Mutate the existing value for `key` in one exclusive step
    ///
    /// Fails with `KeyNotFound` if absent; `f` is not called.
    pub fn update<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Result<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.exclusive(|store| store.get_mut(key).map(f))?
    }

    /// Insert `init()` if `key` is absent, then apply `f`, in one exclusive step
    ///
    /// Concurrent increments expressed this way never lose updates.
    pub fn upsert<R>(
        &self,
        key: K,
        init: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> Result<R> {
        self.exclusive(|store| f(store.get_or_insert_with(key, init)))
    }
}

impl<K, V, S> ConcurrentTable<K, V, S>
where
    K: Clone,
    V: Clone,
{
    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Owned copy of every entry, taken under one shared acquisition
    pub fn items(&self) -> Result<Vec<(K, V)>> {
        self.shared(|store| store.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        self.shared(|store| store.keys().cloned().collect())
    }

    pub fn values(&self) -> Result<Vec<V>> {
        self.shared(|store| store.values().cloned().collect())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, V> Default for ConcurrentTable<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> From<BucketStore<K, V, S>> for ConcurrentTable<K, V, S> {
    fn from(store: BucketStore<K, V, S>) -> Self {
        Self::from_store(store)
    }
}

impl<K, V, S> fmt::Debug for ConcurrentTable<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ConcurrentTable");
        debug.field("bucket_count", &self.bucket_count);

        // Never blocks: Debug may run on a thread already holding the lock
        match self.store.try_read_recursive() {
            Some(store) => debug.field("len", &store.len()),
            None => debug.field("len", &format_args!("<locked>")),
        };

        debug.field("poisoned", &self.is_poisoned()).finish()
    }
}

/// Same rendering as the store, taken under a shared lock
///
/// Safe to use while the same thread holds a [`ReadGuard`]; deadlocks
/// if used from inside [`ConcurrentTable::with_exclusive`].
impl<K, V, S> fmt::Display for ConcurrentTable<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.read() {
            Ok(store) => fmt::Display::fmt(&*store, f),
            Err(_) => f.write_str("{<poisoned>}"),
        }
    }
}
