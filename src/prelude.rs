//! Prelude module that re-exports commonly used types and traits.
//!
//! Instead of importing each type individually, you can use:
//!
//! ```rust
//! use txjournal_rs::prelude::*;
//! ```

// Entries and the traits that shape them
pub use crate::journal::{CompletionPredicate, EntryCodec, JournalEntry, TransactionId};

// Built-in codecs and predicates
#[cfg(feature = "bincode")]
pub use crate::journal::BincodeEntryCodec;
pub use crate::journal::{AnyCheckpoint, JsonEntryCodec};

// Journals
pub use crate::journal::{JournalConfig, LogSegment, TransactionJournal};

// Queue front-end
pub use crate::journal::{QueueCompletion, QueueOperation, QueueTransactionJournal};

// Errors
pub use crate::journal::{CodecError, JournalError};
