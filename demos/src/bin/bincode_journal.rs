//! Compares on-disk size of the JSON and bincode entry codecs.
//!
//! # Usage:
//! ```bash
//! cargo run --manifest-path demos/Cargo.toml --bin bincode_journal --features bincode
//! ```

use std::sync::Arc;
use tracing::{Level, info, warn};
use txjournal_rs::prelude::*;

fn main() -> Result<(), JournalError> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let json = Arc::new(JsonEntryCodec::new());
    let bincode = Arc::new(BincodeEntryCodec::new());

    let json_bytes = write_sample("json", json)?;
    let bincode_bytes = write_sample("bincode", bincode)?;

    info!(
        "json: {} bytes, bincode: {} bytes ({:.1}% of json)",
        json_bytes,
        bincode_bytes,
        bincode_bytes as f64 * 100.0 / json_bytes.max(1) as f64
    );
    Ok(())
}

fn write_sample(
    name: &str,
    codec: Arc<dyn EntryCodec<u64, QueueOperation<String>>>,
) -> Result<u64, JournalError> {
    info!("Writing sample with the {} codec", codec.format_name());
    let dir = std::env::temp_dir().join(format!("bincode-journal-{name}-{}", std::process::id()));
    let journal: QueueTransactionJournal<u64, String> = QueueTransactionJournal::open(&dir, codec)?;
    journal.clear()?;

    for tx in 0..100u64 {
        journal.log_add(tx, "orders", format!("order-{tx}"))?;
        journal.log_prepare(tx)?;
    }
    let bytes = journal
        .journal()
        .segments()
        .iter()
        .map(|segment| std::fs::metadata(segment.path()).map(|m| m.len()).unwrap_or(0))
        .sum();
    journal.close();

    if let Err(e) = std::fs::remove_dir_all(&dir) {
        warn!(error = %e, "could not remove demo directory");
    }
    Ok(bytes)
}
