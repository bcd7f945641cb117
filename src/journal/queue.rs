//! Typed journal front-end for transactional queues.
//!
//! A transactional queue records three kinds of operations (add at the
//! tail, add at the head, remove) and three boundary events (prepare,
//! commit, rollback). [`QueueTransactionJournal`] fixes the payload type to
//! [`QueueOperation`] and the completion rule to [`QueueCompletion`] so the
//! queue implementation only deals with named operations.
//!
//! On restart, [`in_flight_transactions`](QueueTransactionJournal::in_flight_transactions)
//! lists the transactions whose history survived, and
//! [`entries_for`](QueueTransactionJournal::entries_for) gives the
//! operations to undo or redo for each.

use super::codec::EntryCodec;
use super::config::JournalConfig;
use super::entry::{JournalEntry, TransactionId};
use super::error::JournalError;
use super::predicate::CompletionPredicate;
use super::tx_journal::TransactionJournal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One queue operation or transaction-boundary event.
///
/// The generic parameter `V` is the type of the values held by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueOperation<V> {
    /// A value was offered at the tail of a queue.
    Add {
        /// Name of the queue.
        queue: String,
        /// The value added.
        value: V,
    },
    /// A value was pushed back at the head of a queue.
    AddFirst {
        /// Name of the queue.
        queue: String,
        /// The value added.
        value: V,
    },
    /// A value was taken from a queue.
    Remove {
        /// Name of the queue.
        queue: String,
        /// The value removed.
        value: V,
    },
    /// First phase of a two-phase commit succeeded.
    Prepare,
    /// The transaction committed.
    Commit,
    /// The transaction rolled back.
    Rollback,
}

impl<V> QueueOperation<V> {
    /// Name of the queue touched, for update operations.
    #[must_use]
    pub fn queue(&self) -> Option<&str> {
        match self {
            QueueOperation::Add { queue, .. }
            | QueueOperation::AddFirst { queue, .. }
            | QueueOperation::Remove { queue, .. } => Some(queue),
            QueueOperation::Prepare | QueueOperation::Commit | QueueOperation::Rollback => None,
        }
    }

    /// Returns `true` for commit and rollback.
    #[must_use]
    pub fn ends_transaction(&self) -> bool {
        matches!(self, QueueOperation::Commit | QueueOperation::Rollback)
    }
}

/// Completion rule for queue transactions: a commit or a rollback ends the
/// transaction, a prepare does not.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueCompletion;

impl<T, V> CompletionPredicate<T, QueueOperation<V>> for QueueCompletion {
    #[inline]
    fn is_complete(&self, checkpoint: &JournalEntry<T, QueueOperation<V>>) -> bool {
        checkpoint.payload().ends_transaction()
    }
}

/// Journal of queue transactions.
pub struct QueueTransactionJournal<T, V> {
    journal: TransactionJournal<T, QueueOperation<V>>,
}

impl<T, V> QueueTransactionJournal<T, V>
where
    T: TransactionId,
    V: Clone,
{
    /// Open or create a queue journal in `directory` with the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// See [`TransactionJournal::open`].
    pub fn open<Q: AsRef<Path>>(
        directory: Q,
        codec: Arc<dyn EntryCodec<T, QueueOperation<V>>>,
    ) -> Result<Self, JournalError> {
        Self::open_with_config(directory, codec, JournalConfig::default())
    }

    /// Open or create a queue journal with a custom configuration.
    ///
    /// # Errors
    ///
    /// See [`TransactionJournal::open_with_config`].
    pub fn open_with_config<Q: AsRef<Path>>(
        directory: Q,
        codec: Arc<dyn EntryCodec<T, QueueOperation<V>>>,
        config: JournalConfig,
    ) -> Result<Self, JournalError> {
        let journal = TransactionJournal::open_with_config(directory, QueueCompletion, codec, config)?;
        Ok(Self { journal })
    }

    /// Record that `tx_id` added `value` at the tail of `queue`.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_update`] errors.
    pub fn log_add(&self, tx_id: T, queue: impl Into<String>, value: V) -> Result<(), JournalError> {
        self.journal.log_update(JournalEntry::update(
            tx_id,
            QueueOperation::Add {
                queue: queue.into(),
                value,
            },
        ))
    }

    /// Record that `tx_id` pushed `value` back at the head of `queue`.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_update`] errors.
    pub fn log_add_first(
        &self,
        tx_id: T,
        queue: impl Into<String>,
        value: V,
    ) -> Result<(), JournalError> {
        self.journal.log_update(JournalEntry::update(
            tx_id,
            QueueOperation::AddFirst {
                queue: queue.into(),
                value,
            },
        ))
    }

    /// Record that `tx_id` removed `value` from `queue`.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_update`] errors.
    pub fn log_remove(&self, tx_id: T, queue: impl Into<String>, value: V) -> Result<(), JournalError> {
        self.journal.log_update(JournalEntry::update(
            tx_id,
            QueueOperation::Remove {
                queue: queue.into(),
                value,
            },
        ))
    }

    /// Record that `tx_id` is prepared. Its history is kept.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_checkpoint`] errors.
    pub fn log_prepare(&self, tx_id: T) -> Result<(), JournalError> {
        self.journal
            .log_checkpoint(JournalEntry::checkpoint(tx_id, QueueOperation::Prepare))
    }

    /// Record that `tx_id` committed. Its history is discarded.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_checkpoint`] errors.
    pub fn log_commit(&self, tx_id: T) -> Result<(), JournalError> {
        self.journal
            .log_checkpoint(JournalEntry::checkpoint(tx_id, QueueOperation::Commit))
    }

    /// Record that `tx_id` rolled back. Its history is discarded.
    ///
    /// # Errors
    ///
    /// Propagates [`TransactionJournal::log_checkpoint`] errors.
    pub fn log_rollback(&self, tx_id: T) -> Result<(), JournalError> {
        self.journal
            .log_checkpoint(JournalEntry::checkpoint(tx_id, QueueOperation::Rollback))
    }

    /// Journaled operations of `tx_id`, in logging order.
    #[must_use]
    pub fn entries_for(&self, tx_id: &T) -> Vec<JournalEntry<T, QueueOperation<V>>> {
        self.journal.entries_for(tx_id)
    }

    /// Transactions that still have journal history, i.e. those a restarted
    /// queue has to recover.
    #[must_use]
    pub fn in_flight_transactions(&self) -> Vec<T> {
        self.journal.transaction_ids()
    }

    /// Returns `true` if the last checkpoint of `tx_id` is a prepare.
    #[must_use]
    pub fn is_prepared(&self, tx_id: &T) -> bool {
        self.journal
            .entries_for(tx_id)
            .iter()
            .rev()
            .find(|entry| entry.is_checkpoint())
            .is_some_and(|entry| matches!(entry.payload(), QueueOperation::Prepare))
    }

    /// Discard all journal history.
    ///
    /// # Errors
    ///
    /// See [`TransactionJournal::clear`].
    pub fn clear(&self) -> Result<(), JournalError> {
        self.journal.clear()
    }
}

impl<T, V> QueueTransactionJournal<T, V> {
    /// Close the underlying journal.
    pub fn close(&self) {
        self.journal.close();
    }

    /// The underlying generic journal.
    #[must_use]
    #[inline]
    pub fn journal(&self) -> &TransactionJournal<T, QueueOperation<V>> {
        &self.journal
    }
}

impl<T, V> std::fmt::Debug for QueueTransactionJournal<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueTransactionJournal")
            .field("journal", &self.journal)
            .finish()
    }
}
