//! Two-segment transaction journal with rotation.
//!
//! [`TransactionJournal`] owns exactly two [`LogSegment`]s, one *active*
//! and one *standby*, and routes every entry to the segment that already
//! hosts its transaction. New transactions go to the active segment. Once
//! the active segment holds more transactions than
//! [`JournalConfig::max_segment_transactions`] and the standby is empty,
//! the roles swap: new work lands in the fresh file while the old one
//! drains as transactions complete, and eventually compacts.
//!
//! # Invariants
//!
//! - All entries of a transaction live in exactly one segment until the
//!   transaction is cleared.
//! - Roles only swap while the standby segment holds no transactions.
//! - A segment file is only compacted once it holds no live transactions.
//!
//! Routing, rotation and the delegated segment write happen under one
//! journal-wide lock, so these hold under concurrent callers.

use super::codec::EntryCodec;
use super::config::JournalConfig;
use super::entry::{JournalEntry, TransactionId};
use super::error::JournalError;
use super::predicate::{CompletionPredicate, completes};
use super::segment::LogSegment;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// A durable journal of transactional operations, split over two files.
///
/// # Thread Safety
///
/// The journal is `Send + Sync` and meant to be shared behind an [`Arc`]
/// by every thread that performs transactional work on the owning
/// resource. Writes are linearized by a journal-wide mutex; each append
/// is synced to disk before the call returns.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use txjournal_rs::{JournalEntry, JsonEntryCodec, TransactionJournal};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let journal: TransactionJournal<u64, String> = TransactionJournal::open(
///     "/tmp/queue-journal",
///     |entry: &JournalEntry<u64, String>| entry.payload() == "commit",
///     Arc::new(JsonEntryCodec::new()),
/// )?;
///
/// journal.log_update(JournalEntry::update(1, "add".to_string()))?;
/// journal.log_checkpoint(JournalEntry::checkpoint(1, "commit".to_string()))?;
/// assert!(journal.entries_for(&1).is_empty());
/// journal.close();
/// # Ok(())
/// # }
/// ```
pub struct TransactionJournal<T, P> {
    directory: PathBuf,
    segments: [LogSegment<T, P>; 2],
    /// Index into `segments` of the active segment. Also the routing lock.
    active: Mutex<usize>,
    predicate: Box<dyn CompletionPredicate<T, P>>,
    config: JournalConfig,
}

impl<T, P> TransactionJournal<T, P>
where
    T: TransactionId,
    P: Clone,
{
    /// Open or create a journal in `directory` with the default
    /// [`JournalConfig`].
    ///
    /// Both segment files are replayed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the directory cannot be created or either
    /// segment fails to open or recover.
    pub fn open<Q: AsRef<Path>>(
        directory: Q,
        predicate: impl CompletionPredicate<T, P> + 'static,
        codec: Arc<dyn EntryCodec<T, P>>,
    ) -> Result<Self, JournalError> {
        Self::open_with_config(directory, predicate, codec, JournalConfig::default())
    }

    /// Open or create a journal in `directory` with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::InvalidConfig`] for an unusable configuration,
    /// otherwise the same errors as [`open`](TransactionJournal::open).
    pub fn open_with_config<Q: AsRef<Path>>(
        directory: Q,
        predicate: impl CompletionPredicate<T, P> + 'static,
        codec: Arc<dyn EntryCodec<T, P>>,
        config: JournalConfig,
    ) -> Result<Self, JournalError> {
        config.validate()?;

        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| JournalError::io_at(&directory, e))?;

        let predicate: Box<dyn CompletionPredicate<T, P>> = Box::new(predicate);
        let [first_name, second_name] = &config.segment_file_names;
        let first = LogSegment::open_with_predicate(
            directory.join(first_name),
            Arc::clone(&codec),
            predicate.as_ref(),
            config.compaction_threshold,
        )?;
        let second = LogSegment::open_with_predicate(
            directory.join(second_name),
            codec,
            predicate.as_ref(),
            config.compaction_threshold,
        )?;

        // New work starts in whichever file has less to drain.
        let active = usize::from(second.size() < first.size());
        debug!(
            directory = %directory.display(),
            recovered = first.size() + second.size(),
            active,
            "transaction journal opened"
        );

        Ok(Self {
            directory,
            segments: [first, second],
            active: Mutex::new(active),
            predicate,
            config,
        })
    }

    /// Durably record an update entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::EntryKindMismatch`] for a checkpoint entry,
    /// otherwise propagates any [`JournalError`] from routing or the segment
    /// append.
    pub fn log_update(&self, entry: JournalEntry<T, P>) -> Result<(), JournalError> {
        expect_kind(&entry, false)?;
        let mut active = self.lock_routing()?;
        let slot = self.determine_segment(&mut active, entry.tx_id())?;
        self.segments[slot].append(entry)
    }

    /// Durably record a checkpoint entry.
    ///
    /// If the completion predicate judges the checkpoint to end its
    /// transaction, the transaction's history is cleared from the segment
    /// that holds it.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::EntryKindMismatch`] for an update entry,
    /// otherwise propagates any [`JournalError`] from routing, the segment
    /// append or the clear (including a compaction it triggers).
    pub fn log_checkpoint(&self, entry: JournalEntry<T, P>) -> Result<(), JournalError> {
        expect_kind(&entry, true)?;
        let mut active = self.lock_routing()?;
        let slot = self.determine_segment(&mut active, entry.tx_id())?;
        let completed =
            completes(self.predicate.as_ref(), &entry).then(|| entry.tx_id().clone());

        self.segments[slot].append(entry)?;

        if let Some(tx_id) = completed {
            trace!(tx_id = ?tx_id, "transaction complete");
            self.segments[slot].clear_transaction(&tx_id)?;
        }
        Ok(())
    }

    /// Entries recorded for `tx_id`, in logging order.
    ///
    /// Checks the active segment, then the standby. Returns an empty vector
    /// if neither holds the transaction. Never rotates.
    #[must_use]
    pub fn entries_for(&self, tx_id: &T) -> Vec<JournalEntry<T, P>> {
        let active = self.read_routing();
        let (active_segment, standby_segment) = self.by_role(*active);
        if active_segment.contains_transaction(tx_id) {
            return active_segment.entries_for(tx_id);
        }
        standby_segment.entries_for(tx_id)
    }

    /// Every live transaction with its entries, across both segments.
    ///
    /// # Panics
    ///
    /// Panics if a transaction id is found in both segments, which would
    /// mean routing split a transaction.
    #[must_use]
    pub fn all_entries(&self) -> HashMap<T, Vec<JournalEntry<T, P>>> {
        let active = self.read_routing();
        let (active_segment, standby_segment) = self.by_role(*active);

        let mut merged: HashMap<T, Vec<JournalEntry<T, P>>> = HashMap::new();
        for segment in [active_segment, standby_segment] {
            for (tx_id, entries) in segment.all_entries() {
                if let Some(existing) = merged.insert(tx_id.clone(), entries) {
                    panic!(
                        "transaction {tx_id:?} found in both journal segments ({} entries already merged)",
                        existing.len()
                    );
                }
            }
        }
        merged
    }

    /// Ids of every live transaction: the active segment's first, then the
    /// standby's, each in first-entry order.
    #[must_use]
    pub fn transaction_ids(&self) -> Vec<T> {
        let active = self.read_routing();
        let (active_segment, standby_segment) = self.by_role(*active);
        let mut ids = active_segment.transaction_ids();
        ids.extend(standby_segment.transaction_ids());
        ids
    }

    /// Returns `true` if no transaction has live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let (active, standby) = self.segment_sizes();
        active == 0 && standby == 0
    }

    /// Number of transactions in the (active, standby) segments.
    #[must_use]
    pub fn segment_sizes(&self) -> (usize, usize) {
        let active = self.read_routing();
        let (active_segment, standby_segment) = self.by_role(*active);
        (active_segment.size(), standby_segment.size())
    }

    /// Compact both segments unconditionally, discarding all history.
    ///
    /// This is an administrative reset. Callers must make sure no
    /// transaction is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if either segment fails to compact.
    pub fn clear(&self) -> Result<(), JournalError> {
        let _active = self.lock_routing()?;
        for segment in &self.segments {
            segment.reset()?;
        }
        debug!(directory = %self.directory.display(), "transaction journal cleared");
        Ok(())
    }

    /// Pick the segment for `tx_id`, rotating first if it is a new
    /// transaction, the active segment is over the limit and the standby is
    /// empty. Must be called with the routing lock held.
    fn determine_segment(&self, active: &mut usize, tx_id: &T) -> Result<usize, JournalError> {
        let current = *active;
        let standby = 1 - current;

        let (in_active, active_size) = self.segments[current].routing_view(tx_id)?;
        if in_active {
            return Ok(current);
        }
        let (in_standby, standby_size) = self.segments[standby].routing_view(tx_id)?;
        if in_standby {
            return Ok(standby);
        }

        if active_size > self.config.max_segment_transactions && standby_size == 0 {
            *active = standby;
            debug!(
                from = %self.segments[current].path().display(),
                to = %self.segments[standby].path().display(),
                draining = active_size,
                "journal segments rotated"
            );
        }
        Ok(*active)
    }
}

impl<T, P> TransactionJournal<T, P> {
    /// Close both segments. Errors are logged, not returned.
    pub fn close(&self) {
        for segment in &self.segments {
            segment.close();
        }
        debug!(directory = %self.directory.display(), "transaction journal closed");
    }

    /// Directory holding the segment files.
    #[must_use]
    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The configuration the journal was opened with.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Path of the segment currently receiving new transactions.
    #[must_use]
    pub fn active_segment_path(&self) -> &Path {
        let active = self.read_routing();
        self.segments[*active].path()
    }

    /// Path of the segment currently draining.
    #[must_use]
    pub fn standby_segment_path(&self) -> &Path {
        let active = self.read_routing();
        self.segments[1 - *active].path()
    }

    /// Both segments in file-name order, regardless of their current role.
    #[must_use]
    pub fn segments(&self) -> [&LogSegment<T, P>; 2] {
        [&self.segments[0], &self.segments[1]]
    }

    fn by_role(&self, active: usize) -> (&LogSegment<T, P>, &LogSegment<T, P>) {
        (&self.segments[active], &self.segments[1 - active])
    }

    fn lock_routing(&self) -> Result<MutexGuard<'_, usize>, JournalError> {
        self.active.lock().map_err(|_| JournalError::MutexPoisoned)
    }

    /// Routing lock for read-only queries. A poisoned lock still holds a
    /// valid slot index, so readers carry on.
    fn read_routing(&self) -> MutexGuard<'_, usize> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, P> std::fmt::Debug for TransactionJournal<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = *self.read_routing();
        f.debug_struct("TransactionJournal")
            .field("directory", &self.directory)
            .field("active", &self.segments[active])
            .field("standby", &self.segments[1 - active])
            .field("config", &self.config)
            .finish()
    }
}

fn expect_kind<T, P>(entry: &JournalEntry<T, P>, checkpoint: bool) -> Result<(), JournalError> {
    if entry.is_checkpoint() == checkpoint {
        return Ok(());
    }
    Err(JournalError::EntryKindMismatch {
        expected: if checkpoint { "checkpoint" } else { "update" },
        found: entry.kind(),
    })
}
