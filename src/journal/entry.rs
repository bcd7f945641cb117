//! The unit of journaled information.
//!
//! A [`JournalEntry`] is either an update (one operation performed on the
//! transactional resource) or a checkpoint (a transaction boundary such as
//! commit, rollback or prepare). Both carry the owning transaction id and a
//! caller-defined payload. Entries are immutable once built.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// Marker trait for transaction identifiers.
///
/// Any opaque, comparable, hashable value qualifies: integers, strings,
/// UUIDs, or a caller-defined newtype. The journal never looks inside it.
pub trait TransactionId: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> TransactionId for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// A single journal record.
///
/// The generic parameter `T` is the transaction id type and `P` the payload
/// describing the operation or boundary event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntry<T, P> {
    /// Record of one operation on the transactional resource.
    Update {
        /// The transaction that performed the operation.
        tx_id: T,
        /// Caller-defined description of the operation.
        payload: P,
    },

    /// Record of a transaction-boundary event.
    Checkpoint {
        /// The transaction that reached the boundary.
        tx_id: T,
        /// Caller-defined description of the event.
        payload: P,
    },
}

impl<T, P> JournalEntry<T, P> {
    /// Create an update entry.
    #[must_use]
    #[inline]
    pub fn update(tx_id: T, payload: P) -> Self {
        JournalEntry::Update { tx_id, payload }
    }

    /// Create a checkpoint entry.
    #[must_use]
    #[inline]
    pub fn checkpoint(tx_id: T, payload: P) -> Self {
        JournalEntry::Checkpoint { tx_id, payload }
    }

    /// The transaction this entry belongs to.
    #[must_use]
    #[inline]
    pub fn tx_id(&self) -> &T {
        match self {
            JournalEntry::Update { tx_id, .. } | JournalEntry::Checkpoint { tx_id, .. } => tx_id,
        }
    }

    /// The caller-defined payload.
    #[must_use]
    #[inline]
    pub fn payload(&self) -> &P {
        match self {
            JournalEntry::Update { payload, .. } | JournalEntry::Checkpoint { payload, .. } => {
                payload
            }
        }
    }

    /// Returns `true` for checkpoint entries.
    #[must_use]
    #[inline]
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, JournalEntry::Checkpoint { .. })
    }

    /// Returns `true` for update entries.
    #[must_use]
    #[inline]
    pub fn is_update(&self) -> bool {
        matches!(self, JournalEntry::Update { .. })
    }

    /// `"update"` or `"checkpoint"`, for messages.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            JournalEntry::Update { .. } => "update",
            JournalEntry::Checkpoint { .. } => "checkpoint",
        }
    }

    /// Consume the entry and return its transaction id and payload.
    #[must_use]
    pub fn into_parts(self) -> (T, P) {
        match self {
            JournalEntry::Update { tx_id, payload } | JournalEntry::Checkpoint { tx_id, payload } => {
                (tx_id, payload)
            }
        }
    }
}
