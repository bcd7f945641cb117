// demos/src/bin/queue_recovery.rs
//
// This demo journals the work of a transactional queue, drops the journal
// without closing it to simulate a crash, and then reopens it to find the
// transactions that were still in flight.
//
// - a committed transaction leaves nothing behind
// - an unprepared transaction is recovered and rolled back
// - a prepared transaction is recovered and committed
//
// Run this demo with:
//   cargo run --bin queue_recovery
//   (from the demos directory)

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Level, info, warn};
use txjournal_rs::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    sku: String,
    quantity: u32,
}

type Journal = QueueTransactionJournal<Uuid, Order>;

fn main() -> Result<(), JournalError> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();
    info!("Queue Recovery Demo");

    let dir = std::env::temp_dir().join(format!("queue-recovery-{}", Uuid::new_v4()));
    let codec = Arc::new(JsonEntryCodec::new());

    let (unprepared, prepared) = {
        let journal: Journal = QueueTransactionJournal::open(&dir, codec.clone())?;
        run_workload(&journal)?
        // The journal is dropped here without `close`.
    };

    info!("\n=== Restart ===");
    let journal: Journal = QueueTransactionJournal::open(&dir, codec)?;
    recover(&journal)?;

    assert!(journal.entries_for(&unprepared).is_empty());
    assert!(journal.entries_for(&prepared).is_empty());
    journal.close();

    if let Err(e) = std::fs::remove_dir_all(&dir) {
        warn!(error = %e, "could not remove demo directory");
    }
    Ok(())
}

/// Journal three transactions; return the ids of the two left in flight.
fn run_workload(journal: &Journal) -> Result<(Uuid, Uuid), JournalError> {
    info!("\n=== Workload ===");

    let committed = Uuid::new_v4();
    journal.log_add(committed, "orders", order("apple", 3))?;
    journal.log_commit(committed)?;
    info!("Transaction {} committed", committed);

    let unprepared = Uuid::new_v4();
    journal.log_remove(unprepared, "orders", order("pear", 1))?;
    journal.log_add(unprepared, "shipping", order("pear", 1))?;
    info!("Transaction {} left open", unprepared);

    let prepared = Uuid::new_v4();
    journal.log_add_first(prepared, "orders", order("plum", 7))?;
    journal.log_prepare(prepared)?;
    info!("Transaction {} prepared", prepared);

    Ok((unprepared, prepared))
}

fn recover(journal: &Journal) -> Result<(), JournalError> {
    for tx_id in journal.in_flight_transactions() {
        let operations = journal.entries_for(&tx_id);
        info!("Transaction {} has {} journaled operations:", tx_id, operations.len());
        for entry in &operations {
            info!("  {}", serde_json::to_string(entry.payload()).unwrap_or_default());
        }

        if journal.is_prepared(&tx_id) {
            info!("  -> prepared, committing");
            journal.log_commit(tx_id)?;
        } else {
            info!("  -> not prepared, rolling back");
            journal.log_rollback(tx_id)?;
        }
    }
    info!("In flight after recovery: {}", journal.in_flight_transactions().len());
    Ok(())
}

fn order(sku: &str, quantity: u32) -> Order {
    Order {
        sku: sku.to_string(),
        quantity,
    }
}
