//! Configuration for chaintable
//!
//! Centralized construction parameters with sensible defaults.

use crate::error::{Result, TableError};

/// Bucket count used when none is given.
pub const DEFAULT_BUCKET_COUNT: usize = 100;

/// Construction parameters for a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Number of buckets (chains). Fixed for the table's lifetime:
    /// there is no rehashing, so lookups degrade linearly once the
    /// entry count grows well past this value.
    pub bucket_count: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
        }
    }
}

impl TableConfig {
    /// Create a new config builder
    pub fn builder() -> TableConfigBuilder {
        TableConfigBuilder::default()
    }

    /// Reject parameters no table can be built from
    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(TableError::Config(
                "bucket_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for TableConfig
#[derive(Default)]
pub struct TableConfigBuilder {
    config: TableConfig,
}

impl TableConfigBuilder {
    /// Set the number of buckets
    pub fn bucket_count(mut self, count: usize) -> Self {
        self.config.bucket_count = count;
        self
    }

    pub fn build(self) -> TableConfig {
        self.config
    }
}
