//! # chaintable
//!
//! A chained hash table with a fixed bucket count, safe to read, write and
//! clear from many threads at once:
//! - Open hashing: one chain per bucket, linear scan on lookup
//! - No rehashing: the bucket count chosen at construction never changes
//! - Multiple-reader / single-writer guard with compound atomic updates
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Worker Threads                          │
//! │               (Arc<ConcurrentTable<K, V>>)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Concurrency Guard                           │
//! │      (RwLock: shared reads / exclusive writes + poison)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Bucket Store                              │
//! │        hash(key) % N  →  bucket  →  linear chain scan        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod stats;

pub mod store;
pub mod guard;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{TableError, Result};
pub use config::{TableConfig, DEFAULT_BUCKET_COUNT};
pub use stats::TableStats;
pub use store::BucketStore;
pub use guard::{ConcurrentTable, ReadGuard};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of chaintable
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
