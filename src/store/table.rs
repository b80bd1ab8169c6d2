//! BucketStore implementation
//!
//! Fixed-size array of chains. No locking; see `guard` for shared use.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use crate::config::{TableConfig, DEFAULT_BUCKET_COUNT};
use crate::error::{Result, TableError};
use crate::stats::TableStats;

use super::{Bucket, IntoIter, Iter, Keys, Values};

/// Chained hash table with a fixed number of buckets
///
/// A key is placed in bucket `hash(key) % bucket_count` and found by a
/// linear scan of that bucket's chain. The bucket count is fixed at
/// construction and never changes; there is no rehashing.
///
/// ```
/// use chaintable::BucketStore;
///
/// let mut store = BucketStore::new();
/// store.set("x", 1);
/// store.set("x", 2);
/// assert_eq!(store.get("x"), Ok(&2));
/// assert_eq!(store.count(), 1);
/// ```
#[derive(Clone)]
pub struct BucketStore<K, V, S = RandomState> {
    buckets: Vec<Bucket<K, V>>,
    hash_builder: S,
    len: usize,
}

impl<K, V> BucketStore<K, V, RandomState> {
    /// Create an empty store with the default 100 buckets
    pub fn new() -> Self {
        Self::with_bucket_count(DEFAULT_BUCKET_COUNT)
    }

    /// Create an empty store with `bucket_count` buckets
    ///
    /// # Panics
    /// If `bucket_count` is 0. Use [`BucketStore::from_config`] to get an
    /// error instead.
    pub fn with_bucket_count(bucket_count: usize) -> Self {
        Self::with_hasher(bucket_count, RandomState::new())
    }

    /// Create an empty store from a validated config
    pub fn from_config(config: &TableConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_bucket_count(config.bucket_count))
    }
}

impl<K, V, S> BucketStore<K, V, S> {
    /// Create an empty store that hashes keys with `hash_builder`
    ///
    /// # Panics
    /// If `bucket_count` is 0.
    pub fn with_hasher(bucket_count: usize, hash_builder: S) -> Self {
        assert!(bucket_count > 0, "bucket_count must be at least 1");

        let mut buckets = Vec::with_capacity(bucket_count);
        buckets.resize_with(bucket_count, Bucket::new);

        tracing::debug!("Created bucket store with {} buckets", bucket_count);

        Self {
            buckets,
            hash_builder,
            len: 0,
        }
    }

    /// Number of buckets (fixed)
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of entries across all buckets
    ///
    /// Maintained incrementally on every mutation; matches the sum of
    /// chain lengths.
    pub fn count(&self) -> usize {
        self.len
    }

    /// Alias of [`BucketStore::count`]
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset every bucket to an empty chain
    pub fn clear(&mut self) {
        let dropped: usize = self.buckets.iter_mut().map(Bucket::clear).sum();
        self.len = 0;
        tracing::debug!("Cleared bucket store, {} entries dropped", dropped);
    }

    /// Lazy traversal of all entries: bucket order, then insertion order
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.buckets, self.len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self.iter())
    }

    /// The hasher used to place keys
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Chain-length diagnostics
    pub fn stats(&self) -> TableStats {
        TableStats::from_chain_lengths(self.buckets.iter().map(Bucket::len))
    }
}

impl<K, V, S> BucketStore<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Bucket index for `key`: its hash reduced modulo the bucket count
    ///
    /// Deterministic for equal keys within one store; not stable across
    /// process runs with the default hasher.
    pub fn hash_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        (self.hash_builder.hash_one(key) % self.buckets.len() as u64) as usize
    }

    /// Value for `key`, or `KeyNotFound`
    pub fn get<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.hash_index(key);
        self.buckets[index].get(key).ok_or(TableError::KeyNotFound)
    }

    /// Mutable value for `key`, or `KeyNotFound`
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.hash_index(key);
        self.buckets[index]
            .get_mut(key)
            .ok_or(TableError::KeyNotFound)
    }

    /// Insert or overwrite
    ///
    /// An existing entry keeps its position in the chain and only its
    /// value changes; a new key is appended to the end of the chain.
    /// Returns the previous value on overwrite.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let index = self.hash_index(&key);
        let previous = self.buckets[index].insert(key, value);

        if previous.is_none() {
            self.len += 1;
            tracing::trace!("Appended entry to bucket {}", index);
        } else {
            tracing::trace!("Overwrote entry in bucket {}", index);
        }

        previous
    }

    /// Remove `key` and return its value, or `KeyNotFound`
    pub fn delete<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.hash_index(key);
        let (_, value) = self.buckets[index]
            .remove(key)
            .ok_or(TableError::KeyNotFound)?;

        self.len -= 1;
        tracing::trace!("Removed entry from bucket {}", index);

        Ok(value)
    }

    /// Existence check; never fails
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let index = self.hash_index(key);
        self.buckets[index].get(key).is_some()
    }

    /// Insert `init()` if `key` is absent, then hand out the value
    pub fn get_or_insert_with(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let index = self.hash_index(&key);
        let (value, inserted) = self.buckets[index].get_or_insert_with(key, init);

        if inserted {
            self.len += 1;
            tracing::trace!("Appended entry to bucket {}", index);
        }

        value
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<K, V> Default for BucketStore<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> fmt::Debug for BucketStore<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Renders as `{k1: v1, k2: v2}` in [`BucketStore::iter`] order
impl<K, V, S> fmt::Display for BucketStore<K, V, S>
where
    K: fmt::Display,
    V: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        f.write_str("}")
    }
}

impl<K, V, S> Extend<(K, V)> for BucketStore<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for BucketStore<K, V, RandomState> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl<'a, K, V, S> IntoIterator for &'a BucketStore<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, S> IntoIterator for BucketStore<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter::new(self.buckets, self.len)
    }
}
