//! Concurrency Guard Module
//!
//! Makes a BucketStore safe to share between threads.
//!
//! ## Responsibilities
//! - Exclusive access for every mutation (`set`, `delete`, `clear`)
//! - Shared access for reads, never interleaved with a mutation
//! - Compound read-modify-write under a single exclusive acquisition
//! - Poisoning: a panic inside an exclusive section makes the table
//!   permanently unusable
//!
//! ## Deployment
//! One process, many threads, shared through `Arc<ConcurrentTable<..>>`.
//! No operation blocks on I/O and there is no timeout; a caller that needs
//! bounded waits must layer it on top.

mod poison;
mod table;

pub use table::{ConcurrentTable, ReadGuard};
