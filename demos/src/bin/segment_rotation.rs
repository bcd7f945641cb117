// demos/src/bin/segment_rotation.rs
//
// This demo shows how the journal spreads transactions over its two segment
// files. A long-running transaction keeps the first file alive while new
// work rotates into the second one; once it commits, the first file drains
// and is compacted.
//
// Run this demo with:
//   cargo run --bin segment_rotation
//   (from the demos directory)

use std::sync::Arc;
use tracing::{Level, info};
use txjournal_rs::prelude::*;

type Entry = JournalEntry<u64, String>;

fn main() -> Result<(), JournalError> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();
    info!("Segment Rotation Demo");

    let dir = std::env::temp_dir().join(format!("segment-rotation-{}", std::process::id()));
    let config = JournalConfig::new()
        .with_max_segment_transactions(2)
        .with_compaction_threshold(4);
    let journal: TransactionJournal<u64, String> = TransactionJournal::open_with_config(
        &dir,
        |entry: &Entry| entry.payload() == "commit",
        Arc::new(JsonEntryCodec::new()),
        config,
    )?;

    info!("\n=== Filling the active segment ===");
    journal.log_update(Entry::update(1, "long running".to_string()))?;
    for tx in 2..=3 {
        journal.log_update(Entry::update(tx, "short".to_string()))?;
    }
    report(&journal);

    info!("\n=== New work rotates ===");
    journal.log_update(Entry::update(4, "short".to_string()))?;
    report(&journal);

    info!("\n=== Draining the old segment ===");
    for tx in [2, 3, 4] {
        journal.log_checkpoint(Entry::checkpoint(tx, "commit".to_string()))?;
    }
    report(&journal);
    journal.log_checkpoint(Entry::checkpoint(1, "commit".to_string()))?;
    report(&journal);

    journal.close();
    Ok(())
}

fn report(journal: &TransactionJournal<u64, String>) {
    let (active, standby) = journal.segment_sizes();
    info!(
        "active {} holds {} transactions, standby {} holds {}",
        journal.active_segment_path().display(),
        active,
        journal.standby_segment_path().display(),
        standby
    );
    for segment in journal.segments() {
        let bytes = std::fs::metadata(segment.path()).map(|m| m.len()).unwrap_or(0);
        info!(
            "  {}: {} bytes, {} writes since compaction",
            segment.path().display(),
            bytes,
            segment.write_count()
        );
    }
}
