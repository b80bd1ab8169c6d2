//! Poison tracking for the exclusive lock
//!
//! parking_lot locks release cleanly on unwind and never poison, so a
//! panic inside a caller's closure would leave a half-applied mutation
//! visible to the next holder. The flag below records that case.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Result, TableError};

/// Set once a panic escapes while the exclusive lock is held
#[derive(Debug, Default)]
pub(crate) struct PoisonFlag {
    poisoned: AtomicBool,
}

impl PoisonFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Fail with `GuardFailure` if poisoned
    ///
    /// Call only after acquiring the lock, so a poisoning by the previous
    /// holder is always observed.
    pub(crate) fn check(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(TableError::GuardFailure(
                "a panic occurred while the table was held exclusively".to_string(),
            ));
        }
        Ok(())
    }

    /// Arm a sentinel for the current exclusive section
    ///
    /// Must be created after the write guard so it drops first.
    pub(crate) fn sentinel(&self) -> PanicSentinel<'_> {
        PanicSentinel {
            flag: self,
            panicking_on_entry: thread::panicking(),
        }
    }
}

/// Poisons the flag if dropped during a panic that began inside the section
pub(crate) struct PanicSentinel<'a> {
    flag: &'a PoisonFlag,
    panicking_on_entry: bool,
}

impl Drop for PanicSentinel<'_> {
    fn drop(&mut self) {
        if !self.panicking_on_entry && thread::panicking() {
            self.flag.poisoned.store(true, Ordering::Release);
            tracing::error!("Table poisoned: panic while holding exclusive access");
        }
    }
}
