//! Error types for the journal subsystem.
//!
//! [`JournalError`] covers the operational failure modes of the journal:
//! I/O errors, corrupt segment files found during recovery, encoding
//! failures and lock poisoning. [`CodecError`] is the narrower error
//! returned by [`EntryCodec`](super::codec::EntryCodec) implementations.
//!
//! Internal invariant violations (the same transaction present in both
//! segments, compacting a segment that still holds live transactions) are
//! programming errors and panic instead of being reported here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while encoding or decoding a single journal entry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The stream ended in the middle of a record.
    ///
    /// This is what a crash during an append leaves behind. Recovery treats
    /// it as the end of the valid log and cuts the partial record away.
    #[error("truncated record: expected {expected} bytes, read {read}")]
    Truncated {
        /// Number of bytes the record header announced.
        expected: usize,
        /// Number of bytes actually available.
        read: usize,
    },

    /// The record bytes are present but invalid (bad checksum, bad length,
    /// undecodable payload).
    #[error("corrupt record: {message}")]
    Corrupt {
        /// Description of the problem.
        message: String,
    },

    /// The entry could not be serialized.
    #[error("entry serialization failed: {message}")]
    Serialize {
        /// The underlying serializer message.
        message: String,
    },

    /// Reading from the underlying stream failed.
    #[error("codec I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur within the journal subsystem.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JournalError {
    /// An I/O error occurred while creating, writing or deleting a
    /// journal file.
    #[error("journal I/O error{}: {source}", display_path(.path))]
    Io {
        /// The file or directory involved, if known.
        path: Option<PathBuf>,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Recovery found a record that is not a clean end of file and cannot
    /// be decoded. The segment cannot be trusted, so the open fails.
    #[error(
        "corrupt journal {} at offset {offset} (record {record}): {message}",
        .path.display()
    )]
    CorruptJournal {
        /// The segment file being replayed.
        path: PathBuf,
        /// Byte offset where the failing record starts.
        offset: u64,
        /// Zero-based index of the failing record within the file.
        record: u64,
        /// Description of the decode failure.
        message: String,
    },

    /// An entry could not be encoded for appending.
    #[error("journal entry encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The segment was closed and no longer accepts writes.
    #[error("journal segment {} is closed", .path.display())]
    Closed {
        /// The closed segment file.
        path: PathBuf,
    },

    /// An entry of the wrong kind was passed to a typed log call, e.g. a
    /// checkpoint to `log_update`.
    #[error("expected {expected} entry, got {found}")]
    EntryKindMismatch {
        /// Kind the call accepts.
        expected: &'static str,
        /// Kind of the entry passed.
        found: &'static str,
    },

    /// The journal configuration is not usable.
    #[error("invalid journal configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// An internal mutex was poisoned (another thread panicked while
    /// holding the lock).
    #[error("journal internal mutex poisoned")]
    MutexPoisoned,
}

impl JournalError {
    /// Build an [`JournalError::Io`] bound to a path.
    #[cold]
    pub(crate) fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Self {
        JournalError::Io {
            path: Some(path.into()),
            source,
        }
    }

    /// Returns `true` if this error was raised by recovery of a corrupt
    /// segment file.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, JournalError::CorruptJournal { .. })
    }
}

impl From<io::Error> for JournalError {
    #[cold]
    fn from(source: io::Error) -> Self {
        JournalError::Io { path: None, source }
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" at {}", p.display()),
        None => String::new(),
    }
}
