//! Transactional write-ahead journal.
//!
//! This module provides the durability and recovery substrate for
//! transactional resources such as persistent queues.
//!
//! # Types
//!
//! - [`JournalEntry`]: an update or checkpoint record for one transaction
//! - [`EntryCodec`]: pluggable, self-delimiting entry encoding
//! - [`CompletionPredicate`]: decides when a transaction's history may go
//! - [`LogSegment`]: one append-only file plus its recovery index
//! - [`TransactionJournal`]: two segments with routing and rotation
//! - [`JournalConfig`]: rotation and compaction thresholds, file names
//! - [`JournalError`] / [`CodecError`]: error types
//! - [`QueueTransactionJournal`]: typed front-end for transactional queues
//!
//! # Feature Gate
//!
//! The `BincodeEntryCodec` requires the `bincode` feature:
//!
//! ```toml
//! [dependencies]
//! txjournal-rs = { version = "0.1", features = ["bincode"] }
//! ```

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod predicate;
pub mod queue;
pub mod segment;
pub mod tx_journal;

#[cfg(feature = "bincode")]
pub use codec::BincodeEntryCodec;
pub use codec::{
    EntryCodec, FRAME_CRC_SIZE, FRAME_HEADER_SIZE, FRAME_OVERHEAD, JsonEntryCodec,
    MAX_FRAME_PAYLOAD, encode_frame, read_frame,
};
pub use config::{
    DEFAULT_COMPACTION_THRESHOLD, DEFAULT_MAX_SEGMENT_TRANSACTIONS, DEFAULT_SEGMENT_FILE_NAMES,
    JournalConfig,
};
pub use entry::{JournalEntry, TransactionId};
pub use error::{CodecError, JournalError};
pub use predicate::{AnyCheckpoint, CompletionPredicate};
pub use queue::{QueueCompletion, QueueOperation, QueueTransactionJournal};
pub use segment::LogSegment;
pub use tx_journal::TransactionJournal;
