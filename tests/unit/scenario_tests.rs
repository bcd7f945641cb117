#[cfg(test)]
mod tests_journal_scenarios {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use txjournal_rs::{JournalConfig, JournalEntry, JsonEntryCodec, TransactionJournal};
    use uuid::Uuid;

    type Entry = JournalEntry<Uuid, String>;

    fn is_commit(entry: &Entry) -> bool {
        entry.is_checkpoint() && entry.payload() == "commit"
    }

    fn open(dir: &Path, config: JournalConfig) -> TransactionJournal<Uuid, String> {
        TransactionJournal::open_with_config(dir, is_commit, Arc::new(JsonEntryCodec::new()), config)
            .expect("open journal")
    }

    fn file_len(path: &Path) -> u64 {
        fs::metadata(path).expect("segment metadata").len()
    }

    #[test]
    fn completing_checkpoint_discards_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::default());
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        for op in ["add a", "add b", "remove a"] {
            journal
                .log_update(Entry::update(t1, op.to_string()))
                .expect("log update");
        }
        journal
            .log_update(Entry::update(t2, "add c".to_string()))
            .expect("log update");
        assert_eq!(journal.entries_for(&t1).len(), 3);

        journal
            .log_checkpoint(Entry::checkpoint(t1, "commit".to_string()))
            .expect("log commit");

        assert!(journal.entries_for(&t1).is_empty());
        let all = journal.all_entries();
        assert!(!all.contains_key(&t1));
        assert_eq!(all.len(), 1);
        assert!(all.contains_key(&t2));
    }

    #[test]
    fn full_active_segment_rotates_to_empty_standby() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::new().with_max_segment_transactions(4));
        let original_active = journal.active_segment_path().to_path_buf();
        let original_standby = journal.standby_segment_path().to_path_buf();

        let draining: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        for tx in &draining {
            journal
                .log_update(Entry::update(*tx, "add".to_string()))
                .expect("log update");
        }
        assert_eq!(journal.segment_sizes(), (5, 0));

        let newcomer = Uuid::new_v4();
        journal
            .log_update(Entry::update(newcomer, "add".to_string()))
            .expect("log update");

        assert_eq!(journal.active_segment_path(), original_standby.as_path());
        assert_eq!(journal.standby_segment_path(), original_active.as_path());
        let [first, second] = journal.segments();
        assert!(second.contains_transaction(&newcomer));
        assert!(!first.contains_transaction(&newcomer));

        // Transactions in the draining segment stay there.
        journal
            .log_update(Entry::update(draining[0], "remove".to_string()))
            .expect("log update");
        assert_eq!(first.entries_for(&draining[0]).len(), 2);
        assert!(!second.contains_transaction(&draining[0]));
    }

    #[test]
    fn drained_segment_compacts_past_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JournalConfig::new().with_compaction_threshold(6);
        let journal = open(dir.path(), config);
        let path = journal.active_segment_path().to_path_buf();

        for _ in 0..3 {
            let tx = Uuid::new_v4();
            journal
                .log_update(Entry::update(tx, "add".to_string()))
                .expect("log update");
            journal
                .log_checkpoint(Entry::checkpoint(tx, "commit".to_string()))
                .expect("log commit");
        }
        // Six appends so far: not past the threshold yet.
        assert!(file_len(&path) > 0);

        let tx = Uuid::new_v4();
        journal
            .log_update(Entry::update(tx, "add".to_string()))
            .expect("log update");
        journal
            .log_checkpoint(Entry::checkpoint(tx, "commit".to_string()))
            .expect("log commit");

        assert_eq!(file_len(&path), 0);
        assert_eq!(journal.segments()[0].write_count(), 0);
        assert!(journal.is_empty());
    }

    #[test]
    fn compaction_waits_for_last_live_transaction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::new().with_compaction_threshold(0));
        let path = journal.active_segment_path().to_path_buf();
        let long_running = Uuid::new_v4();
        let short = Uuid::new_v4();

        journal
            .log_update(Entry::update(long_running, "add".to_string()))
            .expect("log update");
        journal
            .log_update(Entry::update(short, "add".to_string()))
            .expect("log update");
        journal
            .log_checkpoint(Entry::checkpoint(short, "commit".to_string()))
            .expect("log commit");

        // `long_running` is still live, so nothing is truncated.
        assert!(file_len(&path) > 0);
        assert_eq!(journal.entries_for(&long_running).len(), 1);

        journal
            .log_checkpoint(Entry::checkpoint(long_running, "commit".to_string()))
            .expect("log commit");
        assert_eq!(file_len(&path), 0);
    }

    #[test]
    fn clear_discards_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::new().with_max_segment_transactions(0));
        for _ in 0..3 {
            journal
                .log_update(Entry::update(Uuid::new_v4(), "add".to_string()))
                .expect("log update");
        }
        assert!(!journal.is_empty());

        journal.clear().expect("clear");

        assert!(journal.is_empty());
        assert!(journal.transaction_ids().is_empty());
        for segment in journal.segments() {
            assert_eq!(file_len(segment.path()), 0);
            assert_eq!(segment.write_count(), 0);
        }
    }

    #[test]
    fn transaction_ids_follow_first_entry_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = open(dir.path(), JournalConfig::default());
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        for tx in ids.iter().rev() {
            journal
                .log_update(Entry::update(*tx, "add".to_string()))
                .expect("log update");
        }
        for tx in &ids {
            journal
                .log_update(Entry::update(*tx, "remove".to_string()))
                .expect("log update");
        }

        let expected: Vec<Uuid> = ids.iter().rev().copied().collect();
        assert_eq!(journal.transaction_ids(), expected);
    }
}
