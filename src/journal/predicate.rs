//! Completion predicates decide when a transaction's history may be dropped.

use super::entry::JournalEntry;

/// Caller-supplied rule deciding whether a checkpoint completes its
/// transaction.
///
/// The journal calls [`is_complete`](CompletionPredicate::is_complete) after
/// every checkpoint it appends. When it returns `true`, the transaction's
/// entries are evicted from the segment that holds them. Implementations
/// must be pure: the journal may call them while holding its routing lock.
///
/// Any `Fn(&JournalEntry<T, P>) -> bool` closure that is `Send + Sync` is a
/// predicate:
///
/// ```rust
/// use txjournal_rs::{CompletionPredicate, JournalEntry};
///
/// let commit_or_rollback =
///     |entry: &JournalEntry<u64, String>| matches!(entry.payload().as_str(), "commit" | "rollback");
///
/// assert!(commit_or_rollback.is_complete(&JournalEntry::checkpoint(1, "commit".to_string())));
/// assert!(!commit_or_rollback.is_complete(&JournalEntry::checkpoint(1, "prepare".to_string())));
/// ```
pub trait CompletionPredicate<T, P>: Send + Sync {
    /// Returns `true` if `checkpoint` marks the end of its transaction.
    fn is_complete(&self, checkpoint: &JournalEntry<T, P>) -> bool;
}

impl<T, P, F> CompletionPredicate<T, P> for F
where
    F: Fn(&JournalEntry<T, P>) -> bool + Send + Sync,
{
    #[inline]
    fn is_complete(&self, checkpoint: &JournalEntry<T, P>) -> bool {
        self(checkpoint)
    }
}

/// Whether appending `entry` ends its transaction.
///
/// Only checkpoints can complete a transaction; updates never reach the
/// predicate. Both live logging and replay decide through this function, so
/// a restart evicts exactly what was evicted before it.
#[inline]
pub(crate) fn completes<T, P>(
    predicate: &dyn CompletionPredicate<T, P>,
    entry: &JournalEntry<T, P>,
) -> bool {
    entry.is_checkpoint() && predicate.is_complete(entry)
}

/// Predicate that treats every checkpoint as completing its transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyCheckpoint;

impl<T, P> CompletionPredicate<T, P> for AnyCheckpoint {
    #[inline]
    fn is_complete(&self, checkpoint: &JournalEntry<T, P>) -> bool {
        checkpoint.is_checkpoint()
    }
}
