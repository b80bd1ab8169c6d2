//! Bucket Store Module
//!
//! The unsynchronized chained hash table.
//!
//! ## Responsibilities
//! - Deterministic placement: `hash(key) % bucket_count`
//! - Linear-chain lookup, overwrite-in-place, ordered removal
//! - Entry count and bulk clear
//! - Lazy iteration in bucket order, then insertion order
//!
//! ## Data Structure Choice
//! A `Vec` of `Vec`-backed chains with a fixed bucket count:
//! - No rehashing, so a key never moves once placed
//! - Unbounded chains; lookups degrade to a linear scan of one bucket
//!   when the entry count grows well past the bucket count
//! - Sharing across threads goes through `guard::ConcurrentTable`

mod bucket;
mod iter;
mod table;

pub use bucket::Bucket;
pub use iter::{IntoIter, Iter, Keys, Values};
pub use table::BucketStore;
