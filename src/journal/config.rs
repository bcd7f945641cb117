//! Tuning knobs for a [`TransactionJournal`](super::TransactionJournal).

use super::error::JournalError;
use serde::{Deserialize, Serialize};

/// Default number of distinct transactions the active segment may hold
/// before new transactions rotate into the standby segment.
pub const DEFAULT_MAX_SEGMENT_TRANSACTIONS: usize = 20_000;

/// Default number of appends a drained segment must have accumulated before
/// its file is compacted.
pub const DEFAULT_COMPACTION_THRESHOLD: u64 = 10_000;

/// Default file names of the two segments inside the journal directory.
pub const DEFAULT_SEGMENT_FILE_NAMES: [&str; 2] = ["tx1.log", "tx2.log"];

/// Configuration of a transaction journal.
///
/// The two thresholds are independent: `max_segment_transactions` bounds how
/// many live transactions pile up in one file before rotation, while
/// `compaction_threshold` sets how many stale records a drained file may
/// carry before it is truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Rotation happens once the active segment holds strictly more than
    /// this many transactions and the standby segment is empty.
    pub max_segment_transactions: usize,
    /// A drained segment is compacted once its write counter is strictly
    /// greater than this value.
    pub compaction_threshold: u64,
    /// File names of the two segments, relative to the journal directory.
    pub segment_file_names: [String; 2],
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            max_segment_transactions: DEFAULT_MAX_SEGMENT_TRANSACTIONS,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
            segment_file_names: DEFAULT_SEGMENT_FILE_NAMES.map(String::from),
        }
    }
}

impl JournalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotation threshold.
    #[must_use]
    pub fn with_max_segment_transactions(mut self, max_segment_transactions: usize) -> Self {
        self.max_segment_transactions = max_segment_transactions;
        self
    }

    /// Sets the compaction threshold.
    #[must_use]
    pub fn with_compaction_threshold(mut self, compaction_threshold: u64) -> Self {
        self.compaction_threshold = compaction_threshold;
        self
    }

    /// Sets the segment file names.
    #[must_use]
    pub fn with_segment_file_names(mut self, first: impl Into<String>, second: impl Into<String>) -> Self {
        self.segment_file_names = [first.into(), second.into()];
        self
    }

    /// Check that the configuration can back a journal.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] if a file name is empty,
    /// contains a path separator, or both names are equal.
    pub fn validate(&self) -> Result<(), JournalError> {
        for name in &self.segment_file_names {
            if name.is_empty() {
                return Err(JournalError::InvalidConfig {
                    message: "segment file name must not be empty".to_string(),
                });
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(JournalError::InvalidConfig {
                    message: format!("segment file name {name:?} must be a plain file name"),
                });
            }
        }
        if self.segment_file_names[0] == self.segment_file_names[1] {
            return Err(JournalError::InvalidConfig {
                message: format!(
                    "both segments would share the file {:?}",
                    self.segment_file_names[0]
                ),
            });
        }
        Ok(())
    }
}
