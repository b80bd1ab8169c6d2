//! Bucket implementation
//!
//! One chain of entries, scanned linearly.

use std::borrow::Borrow;
use std::mem;
use std::slice;

/// A chain of (key, value) entries sharing one hash index
///
/// Entries keep insertion order. Keys are pairwise distinct; the
/// owning store upholds this by always scanning before appending.
#[derive(Debug, Clone)]
pub struct Bucket<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of entries in the chain
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Entries in insertion order
    pub fn iter(&self) -> slice::Iter<'_, (K, V)> {
        self.entries.iter()
    }

    pub(crate) fn into_entries(self) -> Vec<(K, V)> {
        self.entries
    }
}

impl<K: Eq, V> Bucket<K, V> {
    /// Position of `key` in the chain, by equality
    fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        match self.position(key) {
            Some(i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    /// Overwrite in place if `key` is present, otherwise append
    ///
    /// Returns the previous value on overwrite. The stored key is kept;
    /// the incoming (equal) key is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.position(&key) {
            Some(i) => Some(mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Value for `key`, appending `init()` first if absent
    ///
    /// The flag is true when a new entry was appended.
    pub fn get_or_insert_with(&mut self, key: K, init: impl FnOnce() -> V) -> (&mut V, bool) {
        let (i, inserted) = match self.position(&key) {
            Some(i) => (i, false),
            None => {
                self.entries.push((key, init()));
                (self.entries.len() - 1, true)
            }
        };
        (&mut self.entries[i].1, inserted)
    }

    /// Remove the entry for `key`, keeping the order of the rest
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.position(key).map(|i| self.entries.remove(i))
    }
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
