//! A single append-only journal file and its recovery index.
//!
//! [`LogSegment`] owns one physical file plus an in-memory index from
//! transaction id to the ordered entries recorded for it in that file. The
//! file is the source of truth: opening a segment replays every record into
//! the index, and every append reaches stable storage before it returns.
//!
//! Clearing a transaction only drops it from the index. The stale bytes stay
//! on disk until the segment is drained of live transactions and has seen
//! more appends than the compaction threshold, at which point the file is
//! deleted and recreated empty.
//!
//! # Recovery
//!
//! Records are decoded back to back from the start of the file:
//!
//! - a clean end of stream ends recovery;
//! - a record cut short by a crash mid-append ends recovery, and the partial
//!   bytes are truncated away before the file is reopened for append;
//! - any other decode failure aborts the open with
//!   [`JournalError::CorruptJournal`]. Bytes after an undecodable record
//!   cannot be realigned, so nothing past it is guessed at.

use super::codec::EntryCodec;
use super::config::DEFAULT_COMPACTION_THRESHOLD;
use super::entry::{JournalEntry, TransactionId};
use super::error::{CodecError, JournalError};
use super::predicate::{CompletionPredicate, completes};
use crate::utils::{open_append, sync_parent_dir};
use memmap2::Mmap;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, trace, warn};

/// Entries of one transaction inside a segment.
#[derive(Debug)]
struct TxHistory<T, P> {
    /// Position of the transaction's first entry in the segment's
    /// insertion order.
    first_seen: u64,
    entries: Vec<JournalEntry<T, P>>,
}

/// Mutable state of a segment, guarded by the segment mutex.
#[derive(Debug)]
struct SegmentState<T, P> {
    /// Append handle. `None` after `close`, or after a compaction failed
    /// between deleting and recreating the file.
    file: Option<File>,
    /// Set by `close`; a closed segment never reopens its file.
    closed: bool,
    index: HashMap<T, TxHistory<T, P>>,
    /// Transactions keyed by `first_seen`, giving insertion order.
    order: BTreeMap<u64, T>,
    next_seen: u64,
    /// Appends since the file was last compacted.
    write_counter: u64,
    /// Length of the valid data in the file, in bytes.
    len: u64,
}

impl<T: TransactionId, P> SegmentState<T, P> {
    fn empty(file: File) -> Self {
        Self {
            file: Some(file),
            closed: false,
            index: HashMap::new(),
            order: BTreeMap::new(),
            next_seen: 0,
            write_counter: 0,
            len: 0,
        }
    }

    fn insert(&mut self, entry: JournalEntry<T, P>) {
        match self.index.entry(entry.tx_id().clone()) {
            MapEntry::Occupied(mut slot) => slot.get_mut().entries.push(entry),
            MapEntry::Vacant(slot) => {
                let first_seen = self.next_seen;
                self.next_seen = self.next_seen.saturating_add(1);
                self.order.insert(first_seen, slot.key().clone());
                slot.insert(TxHistory {
                    first_seen,
                    entries: vec![entry],
                });
            }
        }
    }

    fn remove(&mut self, tx_id: &T) -> Option<Vec<JournalEntry<T, P>>> {
        let history = self.index.remove(tx_id)?;
        self.order.remove(&history.first_seen);
        Some(history.entries)
    }

    fn clear_index(&mut self) {
        self.index.clear();
        self.order.clear();
        self.next_seen = 0;
    }
}

/// One append-only journal file plus its in-memory recovery index.
///
/// # Thread Safety
///
/// All state sits behind a [`Mutex`], so appends, clears and compaction on
/// the same segment are serialized. Read accessors take the same lock
/// briefly and return copies.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use txjournal_rs::{JournalEntry, JsonEntryCodec, LogSegment};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let segment: LogSegment<u64, String> =
///     LogSegment::open("/tmp/journal/tx1.log", Arc::new(JsonEntryCodec::new()))?;
/// segment.append(JournalEntry::update(1, "add".to_string()))?;
/// assert_eq!(segment.entries_for(&1).len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct LogSegment<T, P> {
    path: PathBuf,
    codec: Arc<dyn EntryCodec<T, P>>,
    compaction_threshold: u64,
    state: Mutex<SegmentState<T, P>>,
}

impl<T, P> LogSegment<T, P>
where
    T: TransactionId,
    P: Clone,
{
    /// Open the segment at `path`, replaying any existing records.
    ///
    /// Uses [`DEFAULT_COMPACTION_THRESHOLD`].
    ///
    /// # Errors
    ///
    /// - [`JournalError::Io`] if the file cannot be created, read or opened.
    /// - [`JournalError::CorruptJournal`] if a record cannot be decoded.
    pub fn open<Q: AsRef<Path>>(
        path: Q,
        codec: Arc<dyn EntryCodec<T, P>>,
    ) -> Result<Self, JournalError> {
        Self::open_with_compaction_threshold(path, codec, DEFAULT_COMPACTION_THRESHOLD)
    }

    /// Open the segment at `path` with a custom compaction threshold.
    ///
    /// Every replayed record is kept in the index.
    ///
    /// # Errors
    ///
    /// Same as [`open`](LogSegment::open).
    pub fn open_with_compaction_threshold<Q: AsRef<Path>>(
        path: Q,
        codec: Arc<dyn EntryCodec<T, P>>,
        compaction_threshold: u64,
    ) -> Result<Self, JournalError> {
        Self::open_inner(path.as_ref(), codec, None, compaction_threshold)
    }

    /// Open the segment at `path`, evicting completed transactions while
    /// replaying.
    ///
    /// Clearing a transaction does not rewrite the file, so its records are
    /// still on disk after a restart. Replaying a checkpoint that
    /// `predicate` judges complete drops the transaction from the index
    /// again, leaving exactly the transactions that were live before the
    /// restart.
    ///
    /// # Errors
    ///
    /// Same as [`open`](LogSegment::open).
    pub fn open_with_predicate<Q: AsRef<Path>>(
        path: Q,
        codec: Arc<dyn EntryCodec<T, P>>,
        predicate: &dyn CompletionPredicate<T, P>,
        compaction_threshold: u64,
    ) -> Result<Self, JournalError> {
        Self::open_inner(path.as_ref(), codec, Some(predicate), compaction_threshold)
    }

    fn open_inner(
        path: &Path,
        codec: Arc<dyn EntryCodec<T, P>>,
        predicate: Option<&dyn CompletionPredicate<T, P>>,
        compaction_threshold: u64,
    ) -> Result<Self, JournalError> {
        let path = path.to_path_buf();

        let state = if path.exists() {
            let recovered = replay(&path, codec.as_ref())?;
            let file = open_append(&path).map_err(|e| JournalError::io_at(&path, e))?;
            if recovered.valid_len < recovered.file_len {
                warn!(
                    path = %path.display(),
                    valid_len = recovered.valid_len,
                    file_len = recovered.file_len,
                    "truncating partial record left by an interrupted append"
                );
                file.set_len(recovered.valid_len)
                    .and_then(|()| file.sync_all())
                    .map_err(|e| JournalError::io_at(&path, e))?;
            }

            let mut state = SegmentState::empty(file);
            let records = recovered.entries.len() as u64;
            for entry in recovered.entries {
                let evict = predicate.is_some_and(|predicate| completes(predicate, &entry));
                if evict {
                    state.remove(entry.tx_id());
                } else {
                    state.insert(entry);
                }
            }
            state.write_counter = records;
            state.len = recovered.valid_len;

            debug!(
                path = %path.display(),
                records,
                transactions = state.index.len(),
                "segment recovered"
            );
            state
        } else {
            let file = open_append(&path).map_err(|e| JournalError::io_at(&path, e))?;
            sync_parent_dir(&path).map_err(|e| JournalError::io_at(&path, e))?;
            debug!(path = %path.display(), "segment created");
            SegmentState::empty(file)
        };

        Ok(Self {
            path,
            codec,
            compaction_threshold,
            state: Mutex::new(state),
        })
    }

    /// Append `entry` durably and index it under its transaction id.
    ///
    /// The record is written in full and synced to stable storage before
    /// this returns. If the write fails, the file is cut back to its
    /// previous length so a later append does not land after a partial
    /// record.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Codec`] if the entry cannot be encoded.
    /// - [`JournalError::Io`] if writing or syncing fails.
    /// - [`JournalError::Closed`] if the segment was closed.
    /// - [`JournalError::MutexPoisoned`] if the segment lock is poisoned.
    pub fn append(&self, entry: JournalEntry<T, P>) -> Result<(), JournalError> {
        let bytes = self.codec.encode(&entry)?;

        let mut guard = self.lock()?;
        let state = &mut *guard;
        self.reacquire_file(state)?;
        let Some(file) = state.file.as_mut() else {
            return Err(JournalError::Closed {
                path: self.path.clone(),
            });
        };

        if let Err(e) = write_durably(file, &bytes) {
            if let Err(rollback) = file.set_len(state.len) {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "failed to roll back partial append"
                );
            }
            return Err(JournalError::io_at(&self.path, e));
        }

        state.len = state.len.saturating_add(bytes.len() as u64);
        state.write_counter = state.write_counter.saturating_add(1);
        trace!(
            path = %self.path.display(),
            tx_id = ?entry.tx_id(),
            checkpoint = entry.is_checkpoint(),
            bytes = bytes.len(),
            "entry appended"
        );
        state.insert(entry);
        Ok(())
    }

    /// Drop every indexed entry of `tx_id`.
    ///
    /// The file is not rewritten. If this empties the index and the write
    /// counter is above the compaction threshold, the segment is compacted.
    /// Clearing an id that is not indexed does nothing.
    ///
    /// Returns the entries that were removed, if any.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the lock is poisoned or a triggered
    /// compaction fails.
    pub fn clear_transaction(
        &self,
        tx_id: &T,
    ) -> Result<Option<Vec<JournalEntry<T, P>>>, JournalError> {
        let mut state = self.lock()?;
        let removed = state.remove(tx_id);

        if removed.is_some() {
            trace!(path = %self.path.display(), tx_id = ?tx_id, "transaction cleared");
            if state.index.is_empty() && state.write_counter > self.compaction_threshold {
                self.compact_locked(&mut state)?;
            }
        }

        Ok(removed)
    }

    /// Delete the file, recreate it empty and reset the write counter.
    ///
    /// # Panics
    ///
    /// Panics if the segment still indexes live transactions. Compacting
    /// then would silently discard their history.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Io`] if the file cannot be deleted or
    /// recreated, and [`JournalError::Closed`] on a closed segment.
    pub fn compact(&self) -> Result<(), JournalError> {
        let mut state = self.lock()?;
        self.compact_locked(&mut state)
    }

    /// Forget every indexed transaction and compact the file.
    ///
    /// This is an administrative reset; callers must make sure no
    /// transaction is in flight.
    ///
    /// # Errors
    ///
    /// Same as [`compact`](LogSegment::compact).
    pub fn reset(&self) -> Result<(), JournalError> {
        let mut state = self.lock()?;
        state.clear_index();
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut SegmentState<T, P>) -> Result<(), JournalError> {
        assert!(
            state.index.is_empty(),
            "compacting segment {} while it holds {} live transactions",
            self.path.display(),
            state.index.len()
        );

        if state.closed {
            return Err(JournalError::Closed {
                path: self.path.clone(),
            });
        }
        drop(state.file.take());

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.compaction_failed(state, e)),
        }
        let file = match open_append(&self.path) {
            Ok(file) => file,
            Err(e) => return Err(self.compaction_failed(state, e)),
        };

        let discarded = state.write_counter;
        state.file = Some(file);
        state.clear_index();
        state.write_counter = 0;
        state.len = 0;

        sync_parent_dir(&self.path).map_err(|e| JournalError::io_at(&self.path, e))?;
        debug!(path = %self.path.display(), discarded, "segment compacted");
        Ok(())
    }

    /// Log a failed compaction and try to get an append handle back right
    /// away. If that fails too, the next append retries.
    #[cold]
    fn compaction_failed(&self, state: &mut SegmentState<T, P>, source: io::Error) -> JournalError {
        warn!(path = %self.path.display(), error = %source, "segment compaction failed");
        if let Err(e) = self.reacquire_file(state) {
            warn!(path = %self.path.display(), error = %e, "segment file not reopened");
        }
        JournalError::io_at(&self.path, source)
    }

    /// Reopen the file for append if a failed compaction left the segment
    /// without a handle. The index is empty at that point, so whatever the
    /// file holds is stale.
    fn reacquire_file(&self, state: &mut SegmentState<T, P>) -> Result<(), JournalError> {
        if state.closed {
            return Err(JournalError::Closed {
                path: self.path.clone(),
            });
        }
        if state.file.is_some() {
            return Ok(());
        }

        let file = open_append(&self.path).map_err(|e| JournalError::io_at(&self.path, e))?;
        let len = file
            .metadata()
            .map_err(|e| JournalError::io_at(&self.path, e))?
            .len();
        if len == 0 {
            state.write_counter = 0;
        }
        state.len = len;
        state.file = Some(file);
        debug!(path = %self.path.display(), len, "segment file reopened");
        Ok(())
    }

    /// Copy of the entries recorded for `tx_id`, in logging order.
    ///
    /// Returns an empty vector if the transaction is not indexed here.
    #[must_use]
    pub fn entries_for(&self, tx_id: &T) -> Vec<JournalEntry<T, P>> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.index.get(tx_id).map(|h| h.entries.clone()))
            .unwrap_or_default()
    }

    /// Snapshot of every indexed transaction with its entries, ordered by
    /// each transaction's first entry.
    #[must_use]
    pub fn all_entries(&self) -> Vec<(T, Vec<JournalEntry<T, P>>)> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .order
            .values()
            .filter_map(|tx_id| {
                state
                    .index
                    .get(tx_id)
                    .map(|h| (tx_id.clone(), h.entries.clone()))
            })
            .collect()
    }

    /// Ids of the indexed transactions, ordered by first entry.
    #[must_use]
    pub fn transaction_ids(&self) -> Vec<T> {
        self.state
            .lock()
            .map(|state| state.order.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `tx_id` has entries in this segment.
    #[must_use]
    pub fn contains_transaction(&self, tx_id: &T) -> bool {
        self.state
            .lock()
            .map(|state| state.index.contains_key(tx_id))
            .unwrap_or(false)
    }

    /// Number of distinct transactions currently indexed.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.lock().map(|state| state.index.len()).unwrap_or(0)
    }

    /// Appends performed since the last compaction.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state.lock().map(|state| state.write_counter).unwrap_or(0)
    }

    /// Lookup used by journal routing: whether `tx_id` lives here and how
    /// many transactions the segment holds. Unlike the public accessors it
    /// reports a poisoned lock instead of answering "absent".
    pub(crate) fn routing_view(&self, tx_id: &T) -> Result<(bool, usize), JournalError> {
        let state = self.lock()?;
        Ok((state.index.contains_key(tx_id), state.index.len()))
    }
}

impl<T, P> LogSegment<T, P> {
    /// Path of the backing file.
    #[must_use]
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` once [`close`](LogSegment::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Sync and release the file handle.
    ///
    /// Failures are logged and swallowed: this runs at shutdown, where the
    /// caller has no further recourse. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        if let Some(file) = state.file.take() {
            if let Err(e) = file.sync_all() {
                error!(path = %self.path.display(), error = %e, "failed to sync segment on close");
            }
            debug!(path = %self.path.display(), "segment closed");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SegmentState<T, P>>, JournalError> {
        self.state.lock().map_err(|_| JournalError::MutexPoisoned)
    }
}

impl<T, P> std::fmt::Debug for LogSegment<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("LogSegment");
        s.field("path", &self.path)
            .field("codec", &self.codec.format_name())
            .field("compaction_threshold", &self.compaction_threshold);
        if let Ok(state) = self.state.lock() {
            s.field("transactions", &state.index.len())
                .field("write_counter", &state.write_counter)
                .field("len", &state.len)
                .field("closed", &state.closed);
        }
        s.finish()
    }
}

// ─── Recovery ───────────────────────────────────────────────────────────────

/// Result of replaying a segment file.
struct Recovered<T, P> {
    entries: Vec<JournalEntry<T, P>>,
    /// End of the last complete record.
    valid_len: u64,
    file_len: u64,
}

/// Decode every record of the file at `path`.
fn replay<T, P>(
    path: &Path,
    codec: &dyn EntryCodec<T, P>,
) -> Result<Recovered<T, P>, JournalError> {
    let file = File::open(path).map_err(|e| JournalError::io_at(path, e))?;
    let file_len = file
        .metadata()
        .map_err(|e| JournalError::io_at(path, e))?
        .len();

    let mut entries = Vec::new();
    if file_len == 0 {
        return Ok(Recovered {
            entries,
            valid_len: 0,
            file_len,
        });
    }

    // SAFETY: Read-only mapping of a segment file owned exclusively by this
    // journal; nothing writes to it until recovery finishes and the mapping
    // is dropped at the end of this function.
    let mmap = unsafe { Mmap::map(&file).map_err(|e| JournalError::io_at(path, e))? };
    let mut cursor = Cursor::new(&mmap[..]);

    let valid_len = loop {
        let offset = cursor.position();
        match codec.decode(&mut cursor) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break offset,
            Err(CodecError::Truncated { expected, read }) => {
                warn!(
                    path = %path.display(),
                    offset,
                    expected,
                    read,
                    "segment ends inside a record"
                );
                break offset;
            }
            Err(e) => {
                return Err(JournalError::CorruptJournal {
                    path: path.to_path_buf(),
                    offset,
                    record: entries.len() as u64,
                    message: e.to_string(),
                });
            }
        }
    };

    Ok(Recovered {
        entries,
        valid_len,
        file_len,
    })
}

/// Write the whole record and push it to stable storage.
fn write_durably(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes)?;
    file.sync_data()
}
