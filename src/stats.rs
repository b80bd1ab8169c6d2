//! Chain-length diagnostics
//!
//! The bucket count never changes, so the load factor is the only signal
//! that lookups have started degrading into long linear scans.

use std::fmt;

/// Snapshot of how entries are spread across buckets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableStats {
    /// Fixed number of buckets
    pub bucket_count: usize,

    /// Total entries across all chains
    pub len: usize,

    /// Buckets whose chain is empty
    pub empty_buckets: usize,

    /// Length of the longest chain (worst-case scan)
    pub longest_chain: usize,

    /// `len / bucket_count`
    pub load_factor: f64,
}

impl TableStats {
    /// Build stats from per-bucket chain lengths
    pub(crate) fn from_chain_lengths(lengths: impl Iterator<Item = usize>) -> Self {
        let mut bucket_count = 0;
        let mut len = 0;
        let mut empty_buckets = 0;
        let mut longest_chain = 0;

        for chain in lengths {
            bucket_count += 1;
            len += chain;
            if chain == 0 {
                empty_buckets += 1;
            }
            longest_chain = longest_chain.max(chain);
        }

        let load_factor = if bucket_count == 0 {
            0.0
        } else {
            len as f64 / bucket_count as f64
        };

        Self {
            bucket_count,
            len,
            empty_buckets,
            longest_chain,
            load_factor,
        }
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries in {} buckets ({} empty), longest chain {}, load factor {:.2}",
            self.len, self.bucket_count, self.empty_buckets, self.longest_chain, self.load_factor
        )
    }
}
