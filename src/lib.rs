//! # Transactional Write-Ahead Journal
//!
//! A crash-safe, append-only journal for transactional resources such as
//! persistent queues. Every operation performed inside a transaction is
//! recorded durably before it takes effect, so that after a crash the
//! owner can reopen the journal, inspect which transactions were still in
//! flight and decide to replay or roll them back.
//!
//! ## Key Features
//!
//! - **Durable Appends**: Each entry is written as a whole, length-prefixed,
//!   CRC-checked record and synced to stable storage before the call returns.
//!
//! - **Two-Segment Rotation**: The journal spreads transactions over two
//!   files. New transactions go to the *active* file; once it grows past a
//!   configurable limit and the *standby* file is empty, the roles swap and
//!   the old file drains as its transactions complete.
//!
//! - **No Split Transactions**: All entries of a transaction always live in
//!   the same file, so a file can be compacted as soon as it holds no live
//!   transaction without losing anything still needed for recovery.
//!
//! - **Pluggable Encoding**: Entries are encoded through the [`EntryCodec`]
//!   trait. A JSON codec is always available; a compact bincode codec is
//!   available behind the `bincode` feature.
//!
//! - **Caller-Defined Completion**: A [`CompletionPredicate`] decides which
//!   checkpoint ends a transaction, so commit and rollback semantics stay
//!   with the resource that owns the journal.
//!
//! ## Recovery
//!
//! Opening a journal replays both files. A record cut short by a crash in
//! the middle of an append is treated as the end of the log and trimmed
//! from the file. Any other unreadable record fails the open with
//! [`JournalError::CorruptJournal`] rather than silently dropping data.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use txjournal_rs::prelude::*;
//!
//! # fn example() -> Result<(), JournalError> {
//! let journal: QueueTransactionJournal<u64, String> =
//!     QueueTransactionJournal::open("/tmp/orders-journal", Arc::new(JsonEntryCodec::new()))?;
//!
//! journal.log_add(7, "orders", "first".to_string())?;
//! journal.log_prepare(7)?;
//!
//! // After a restart, prepared transactions are still there.
//! assert!(journal.is_prepared(&7));
//! journal.log_commit(7)?;
//! journal.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: segment recovery, rotation and
//! compaction at `debug`, per-transaction completion at `trace`, a trimmed
//! partial record at `warn`, and failures while closing at `error`. Install
//! any `tracing` subscriber to see them.

pub mod journal;

pub mod prelude;
mod utils;

#[cfg(feature = "bincode")]
pub use journal::BincodeEntryCodec;
pub use journal::{
    AnyCheckpoint, CodecError, CompletionPredicate, EntryCodec, JournalConfig, JournalEntry,
    JournalError, JsonEntryCodec, LogSegment, QueueCompletion, QueueOperation,
    QueueTransactionJournal, TransactionId, TransactionJournal,
};
