//! Snapshot persistence
//!
//! The latest balances are mirrored to a two-column CSV (`address,balance`)
//! that is rewritten after every successful poll and read back on startup.

use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{Balance, Snapshot};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct BalanceRecord {
    address: String,
    balance: Balance,
}

/// Write the snapshot to `path`, replacing any existing file
pub fn write_snapshot<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> MonitorResult<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(["address", "balance"])?;

    for (address, balance) in snapshot {
        writer.serialize(BalanceRecord {
            address: address.clone(),
            balance: *balance,
        })?;
    }
    writer.flush()?;

    debug!("Wrote {} balances to {:?}", snapshot.len(), path);
    Ok(())
}

/// Read a snapshot previously written by [`write_snapshot`]
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> MonitorResult<Snapshot> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut snapshot = Snapshot::new();

    for (row, result) in reader.deserialize::<BalanceRecord>().enumerate() {
        let record = result.map_err(|e| MonitorError::ParseError {
            path: path.display().to_string(),
            reason: format!("row {}: {}", row + 1, e),
        })?;

        if !record.balance.is_finite() || record.balance < 0.0 {
            return Err(MonitorError::ParseError {
                path: path.display().to_string(),
                reason: format!(
                    "row {}: invalid balance {} for {}",
                    row + 1,
                    record.balance,
                    record.address
                ),
            });
        }

        snapshot.insert(record.address, record.balance);
    }

    info!("Loaded {} prior balances from {:?}", snapshot.len(), path);
    Ok(snapshot)
}

pub fn snapshot_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// Time elapsed since the snapshot file was last written, `None` if it doesn't exist
pub fn last_modified_age<P: AsRef<Path>>(path: P) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    // Clock skew can put mtime in the future
    Some(modified.elapsed().unwrap_or_default())
}
