use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::core::state::AppState;
use crate::wal::wal::WalOperation;

// this runs at boot time
pub fn apply_wal_operations(state: &AppState, operations: &[WalOperation]) -> Result<()> {
    for op in operations {
        match op {
            WalOperation::PutUser { user } => {
                state.users.restore(user.clone());
            }
            WalOperation::RemoveUser { id } => {
                state.users.forget(*id);
            }
            WalOperation::PutPayment { payment } => {
                // the owner may be gone, its id stays retired
                state.users.reserve_ids(payment.user_id + 1);
                state.payments.restore(payment.clone());
            }
            WalOperation::NextUserId { next_id } => {
                state.users.reserve_ids(*next_id);
            }
        }
    }
    Ok(())
}

/// Rewrite the journal as one record per live user and payment, plus the
/// user id high-water mark.
///
/// Both stores are held for writes until the new journal is in place, so no
/// record can land between the snapshot and the swap.
pub fn compact_journal(state: &AppState) -> Result<usize> {
    let _users = state.users.lock_writes();
    let _payments = state.payments.lock_writes();

    let mut operations = state.users.snapshot();
    operations.extend(state.payments.snapshot());

    state
        .wal
        .compact(&operations)
        .context("Failed to compact journal")?;

    Ok(operations.len())
}

/// Compact once at least `threshold` records were appended since the last
/// compaction. Returns the record count of the new journal, if it ran.
pub fn compact_if_needed(state: &AppState, threshold: usize) -> Result<Option<usize>> {
    let pending = state.wal.records_since_compaction();
    if pending < threshold {
        debug!(pending, threshold, "Journal below compaction threshold");
        return Ok(None);
    }

    let records = compact_journal(state)?;
    info!(pending, records, "Journal compacted");
    Ok(Some(records))
}

/// Spawn a background task that periodically compacts a growing journal
pub fn spawn_compaction_task(state: Arc<AppState>, interval_secs: u64, threshold: usize) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

        loop {
            interval.tick().await;

            if let Err(e) = compact_if_needed(&state, threshold) {
                error!(error = %format!("{:#}", e), "Journal compaction failed");
            }
        }
    });
}

/// Replay and compact the journal, then bring the daemon config in line with
/// the restored users.
///
/// A failed config rebuild is logged and startup continues; the previous
/// daemon config stays in place until the next successful sync.
pub fn restore_state(state: &AppState) -> Result<()> {
    let operations = state.wal.replay().context("Failed to replay journal")?;
    apply_wal_operations(state, &operations)?;

    info!(
        operations_replayed = operations.len(),
        users_loaded = state.users.len(),
        payments_loaded = state.payments.len(),
        "Journal replay completed"
    );

    let records = compact_journal(state)?;
    info!(records, "Journal compacted");

    match state.sync.regenerate() {
        Ok(clients) => info!(clients, "Daemon config synchronized"),
        Err(e) => error!(
            error = %e,
            "Failed to synchronize daemon config, continuing with the existing file"
        ),
    }

    Ok(())
}
