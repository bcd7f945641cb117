#[cfg(test)]
mod tests_queue_journal {
    use serde::{Deserialize, Serialize};
    use std::path::Path;
    use std::sync::Arc;
    use txjournal_rs::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Message {
        id: u32,
        body: String,
    }

    fn message(id: u32) -> Message {
        Message {
            id,
            body: format!("message {id}"),
        }
    }

    fn open(dir: &Path, config: JournalConfig) -> QueueTransactionJournal<u64, Message> {
        QueueTransactionJournal::open_with_config(dir, Arc::new(JsonEntryCodec::new()), config)
            .expect("open queue journal")
    }

    #[test]
    fn in_flight_work_is_recovered_after_crash() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open(dir.path(), JournalConfig::default());
            journal.log_add(1, "inbox", message(1)).expect("log add");
            journal.log_remove(2, "outbox", message(2)).expect("log remove");
            journal.log_prepare(2).expect("log prepare");
            journal.log_add(3, "inbox", message(3)).expect("log add");
            journal.log_commit(3).expect("log commit");
            journal.log_add_first(1, "inbox", message(4)).expect("log add first");
            // Crash: no close.
        }

        let journal = open(dir.path(), JournalConfig::default());
        assert_eq!(journal.in_flight_transactions(), vec![1, 2]);
        assert!(!journal.is_prepared(&1));
        assert!(journal.is_prepared(&2));

        let queues: Vec<_> = journal
            .entries_for(&1)
            .iter()
            .map(|entry| entry.payload().queue().map(str::to_string))
            .collect();
        assert_eq!(queues, vec![Some("inbox".to_string()), Some("inbox".to_string())]);

        // Recovery resolves the in-flight work.
        journal.log_rollback(1).expect("log rollback");
        journal.log_commit(2).expect("log commit");
        assert!(journal.in_flight_transactions().is_empty());
        journal.close();
    }

    #[test]
    fn queue_journal_rotates_like_the_generic_journal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::new().with_max_segment_transactions(1));

        journal.log_add(1, "q", message(1)).expect("log add");
        journal.log_add(2, "q", message(2)).expect("log add");
        journal.log_add(3, "q", message(3)).expect("log add");

        assert_eq!(journal.journal().segment_sizes(), (1, 2));
        journal.log_commit(3).expect("log commit");
        assert_eq!(journal.journal().segment_sizes(), (0, 2));
    }

    #[test]
    fn clear_drops_all_queue_transactions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::default());
        journal.log_add(1, "q", message(1)).expect("log add");
        journal.log_prepare(1).expect("log prepare");

        journal.clear().expect("clear");
        assert!(journal.in_flight_transactions().is_empty());
        journal.close();

        let reopened = open(dir.path(), JournalConfig::default());
        assert!(reopened.in_flight_transactions().is_empty());
    }

    #[test]
    fn queue_completion_only_ends_on_commit_or_rollback() {
        let predicate = QueueCompletion;
        let commit = JournalEntry::checkpoint(1u64, QueueOperation::<Message>::Commit);
        let rollback = JournalEntry::checkpoint(1u64, QueueOperation::<Message>::Rollback);
        let prepare = JournalEntry::checkpoint(1u64, QueueOperation::<Message>::Prepare);

        assert!(predicate.is_complete(&commit));
        assert!(predicate.is_complete(&rollback));
        assert!(!predicate.is_complete(&prepare));
    }
}
