//! Error types for chaintable
//!
//! Provides a unified error type for all table operations.

use thiserror::Error;

/// Result type alias using TableError
pub type Result<T> = std::result::Result<T, TableError>;

/// Unified error type for chaintable operations
///
/// Unhashable keys never reach this type: every key is bounded by
/// `Hash + Eq`, so they are rejected at compile time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    /// The exclusive-access guard is unusable; the table must be discarded.
    #[error("Guard failure: {0}")]
    GuardFailure(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TableError {
    /// True for a miss on an absent key.
    ///
    /// Lets call sites fall back to a default without matching variants:
    ///
    /// ```
    /// # use chaintable::{BucketStore, TableError};
    /// let store: BucketStore<&str, i32> = BucketStore::new();
    /// let n = match store.get("hits") {
    ///     Ok(v) => *v,
    ///     Err(e) if e.is_not_found() => 0,
    ///     Err(e) => panic!("{e}"),
    /// };
    /// assert_eq!(n, 0);
    /// ```
    pub fn is_not_found(&self) -> bool {
        matches!(self, TableError::KeyNotFound)
    }

    /// True when the table is poisoned and must be dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TableError::GuardFailure(_))
    }
}
