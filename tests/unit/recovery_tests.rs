#[cfg(test)]
mod tests_recovery {
    use std::fs::{self, OpenOptions};
    use std::io::{Read, Write};
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use txjournal_rs::{
        CodecError, EntryCodec, JournalConfig, JournalEntry, JournalError, JsonEntryCodec,
        LogSegment, TransactionJournal,
    };
    use txjournal_rs::journal::{FRAME_HEADER_SIZE, encode_frame};

    type Entry = JournalEntry<u64, String>;

    fn is_commit(entry: &Entry) -> bool {
        entry.is_checkpoint() && entry.payload() == "commit"
    }

    fn open_with(
        dir: &Path,
        codec: Arc<dyn EntryCodec<u64, String>>,
    ) -> Result<TransactionJournal<u64, String>, JournalError> {
        TransactionJournal::open(dir, is_commit, codec)
    }

    fn open(dir: &Path) -> TransactionJournal<u64, String> {
        open_with(dir, Arc::new(JsonEntryCodec::new())).expect("open journal")
    }

    /// JSON codec whose decoder reports a non-EOF failure on one record.
    #[derive(Debug)]
    struct FailingCodec {
        inner: JsonEntryCodec,
        decoded: AtomicUsize,
        fail_at: usize,
    }

    impl FailingCodec {
        fn failing_at(fail_at: usize) -> Self {
            Self {
                inner: JsonEntryCodec::new(),
                decoded: AtomicUsize::new(0),
                fail_at,
            }
        }
    }

    impl EntryCodec<u64, String> for FailingCodec {
        fn encode(&self, entry: &Entry) -> Result<Vec<u8>, CodecError> {
            self.inner.encode(entry)
        }

        fn decode(&self, reader: &mut dyn Read) -> Result<Option<Entry>, CodecError> {
            if self.decoded.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(CodecError::Corrupt {
                    message: "unknown record tag".to_string(),
                });
            }
            self.inner.decode(reader)
        }

        fn format_name(&self) -> &'static str {
            "failing-json"
        }
    }

    #[test]
    fn close_and_reopen_restores_entries_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let expected = vec![
            Entry::update(1, "add a".to_string()),
            Entry::update(1, "remove b".to_string()),
            Entry::checkpoint(1, "prepare".to_string()),
        ];
        {
            let journal = open(dir.path());
            journal
                .log_update(expected[0].clone())
                .expect("log update");
            journal
                .log_update(Entry::update(2, "add c".to_string()))
                .expect("log update");
            journal
                .log_update(expected[1].clone())
                .expect("log update");
            journal
                .log_checkpoint(expected[2].clone())
                .expect("log prepare");
            journal
                .log_checkpoint(Entry::checkpoint(2, "commit".to_string()))
                .expect("log commit");
            journal.close();
        }

        let journal = open(dir.path());
        assert_eq!(journal.entries_for(&1), expected);
        assert!(journal.entries_for(&2).is_empty());
        assert_eq!(journal.transaction_ids(), vec![1]);
    }

    #[test]
    fn crash_without_close_loses_nothing_acknowledged() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open(dir.path());
            for tx in 0..10u64 {
                journal
                    .log_update(Entry::update(tx, format!("add {tx}")))
                    .expect("log update");
            }
            // Dropped without close.
        }

        let journal = open(dir.path());
        assert_eq!(journal.all_entries().len(), 10);
        assert_eq!(journal.transaction_ids(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn corrupt_record_fails_open_without_skipping() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open(dir.path());
            for tx in 1..=3u64 {
                journal
                    .log_update(Entry::update(tx, "add".to_string()))
                    .expect("log update");
            }
            journal.close();
        }
        let before = fs::read(dir.path().join("tx1.log")).expect("read segment");

        let result = open_with(dir.path(), Arc::new(FailingCodec::failing_at(1)));
        match result {
            Err(JournalError::CorruptJournal {
                record,
                offset,
                message,
                ..
            }) => {
                assert_eq!(record, 1);
                assert!(offset > 0);
                assert!(message.contains("unknown record tag"));
            }
            other => panic!("expected CorruptJournal, got {other:?}"),
        }

        // A failed open leaves the file untouched.
        let after = fs::read(dir.path().join("tx1.log")).expect("read segment");
        assert_eq!(before, after);
    }

    #[test]
    fn flipped_byte_is_reported_as_corruption() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tx1.log");
        {
            let journal = open(dir.path());
            journal
                .log_update(Entry::update(1, "add".to_string()))
                .expect("log update");
            journal.close();
        }

        let mut bytes = fs::read(&path).expect("read segment");
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        fs::write(&path, &bytes).expect("rewrite segment");

        let err = open_with(dir.path(), Arc::new(JsonEntryCodec::new())).expect_err("corrupt");
        assert!(err.is_corrupt());
    }

    #[test]
    fn garbled_length_mid_file_fails_open_and_keeps_later_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tx1.log");
        {
            let journal = open(dir.path());
            for tx in 1..=4u64 {
                journal
                    .log_update(Entry::update(tx, "add".to_string()))
                    .expect("log update");
            }
            journal.close();
        }

        let mut bytes = fs::read(&path).expect("read segment");
        let before_len = bytes.len() as u64;
        let first_record_len = bytes.len() / 4;
        // The second record's length now points past end of file.
        bytes[first_record_len + 2] ^= 0x01;
        fs::write(&path, &bytes).expect("rewrite segment");

        match open_with(dir.path(), Arc::new(JsonEntryCodec::new())) {
            Err(JournalError::CorruptJournal { record, offset, .. }) => {
                assert_eq!(record, 1);
                assert_eq!(offset, first_record_len as u64);
            }
            other => panic!("expected CorruptJournal, got {other:?}"),
        }
        assert_eq!(fs::metadata(&path).expect("metadata").len(), before_len);
        assert!(first_record_len > FRAME_HEADER_SIZE);
    }

    #[test]
    fn partial_tail_is_trimmed_and_journal_keeps_working() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tx1.log");
        {
            let journal = open(dir.path());
            journal
                .log_update(Entry::update(1, "add".to_string()))
                .expect("log update");
            journal.close();
        }
        let intact = fs::metadata(&path).expect("metadata").len();

        // A crash after writing only part of the next record.
        let frame = encode_frame(br#"{"Update":{"tx_id":1,"payload":"lost"}}"#).expect("frame");
        let mut file = OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("open segment");
        file.write_all(&frame[..frame.len() - 5])
            .expect("write partial record");
        drop(file);

        let journal = open(dir.path());
        assert_eq!(fs::metadata(&path).expect("metadata").len(), intact);
        assert_eq!(journal.entries_for(&1).len(), 1);

        journal
            .log_update(Entry::update(1, "remove".to_string()))
            .expect("log update");
        journal.close();

        let reopened = open(dir.path());
        assert_eq!(
            reopened.entries_for(&1),
            vec![
                Entry::update(1, "add".to_string()),
                Entry::update(1, "remove".to_string())
            ]
        );
    }

    #[test]
    fn segment_write_counter_counts_replayed_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("segment.log");
        {
            let segment: LogSegment<u64, String> =
                LogSegment::open(&path, Arc::new(JsonEntryCodec::new())).expect("open segment");
            for tx in 0..4u64 {
                segment
                    .append(Entry::update(tx, "add".to_string()))
                    .expect("append");
            }
            segment.close();
        }

        let segment: LogSegment<u64, String> =
            LogSegment::open_with_compaction_threshold(&path, Arc::new(JsonEntryCodec::new()), 4)
                .expect("reopen segment");
        assert_eq!(segment.write_count(), 4);

        // One more append and the replayed records count towards compaction.
        segment
            .append(Entry::update(9, "add".to_string()))
            .expect("append");
        for tx in [0u64, 1, 2, 3, 9] {
            segment.clear_transaction(&tx).expect("clear");
        }
        assert_eq!(segment.write_count(), 0);
        assert_eq!(fs::metadata(&path).expect("metadata").len(), 0);
    }

    #[test]
    fn recovery_respects_custom_file_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JournalConfig::new().with_segment_file_names("a.wal", "b.wal");
        {
            let journal = TransactionJournal::open_with_config(
                dir.path(),
                is_commit,
                Arc::new(JsonEntryCodec::new()),
                config.clone(),
            )
            .expect("open journal");
            journal
                .log_update(Entry::update(5, "add".to_string()))
                .expect("log update");
            journal.close();
        }
        assert!(dir.path().join("a.wal").exists());
        assert!(dir.path().join("b.wal").exists());
        assert!(!dir.path().join("tx1.log").exists());

        let journal: TransactionJournal<u64, String> = TransactionJournal::open_with_config(
            dir.path(),
            is_commit,
            Arc::new(JsonEntryCodec::new()),
            config,
        )
        .expect("reopen journal");
        assert_eq!(journal.entries_for(&5).len(), 1);
    }

    #[cfg(feature = "bincode")]
    #[test]
    fn bincode_journal_survives_restart() {
        use txjournal_rs::BincodeEntryCodec;

        let dir = tempfile::tempdir().expect("tempdir");
        {
            let journal = open_with(dir.path(), Arc::new(BincodeEntryCodec::new())).expect("open");
            journal
                .log_update(Entry::update(3, "add".to_string()))
                .expect("log update");
            journal
                .log_checkpoint(Entry::checkpoint(3, "prepare".to_string()))
                .expect("log prepare");
            journal.close();
        }

        let journal = open_with(dir.path(), Arc::new(BincodeEntryCodec::new())).expect("reopen");
        assert_eq!(journal.entries_for(&3).len(), 2);
    }
}
