//! Balance change detection
//!
//! Compares a freshly fetched snapshot with the previous one. Every address in
//! the new snapshot gets exactly one classification. Decreases are alerted
//! along with the account's registry metadata; everything else is only logged.

use crate::alerts::{AlertSink, publish_account_info};
use crate::types::{AccountMetadata, Address, Balance, ChangeKind, Snapshot};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceChange {
    pub address: Address,
    pub kind: ChangeKind,
    /// `None` for addresses with no prior balance
    pub previous: Option<Balance>,
    pub current: Balance,
}

impl BalanceChange {
    /// Log line / alert text for this change
    pub fn message(&self) -> String {
        match (self.kind, self.previous) {
            (ChangeKind::Decreased, Some(previous)) => format!(
                "Balance of {} has decreased from {} to {} SOL",
                self.address,
                previous.trunc(),
                self.current.trunc()
            ),
            (ChangeKind::Increased, Some(previous)) => format!(
                "Balance of {} has increased from {} to {} SOL",
                self.address,
                previous.trunc(),
                self.current.trunc()
            ),
            (ChangeKind::Unchanged, _) => {
                format!("Balance of {} has not changed", self.address)
            }
            _ => format!("{} not found in prior balance data", self.address),
        }
    }
}

/// Classify one address. Balances are compared exactly, without tolerance.
pub fn classify(previous: Option<Balance>, current: Balance) -> ChangeKind {
    match previous {
        None => ChangeKind::New,
        Some(previous) if current < previous => ChangeKind::Decreased,
        Some(previous) if current > previous => ChangeKind::Increased,
        Some(_) => ChangeKind::Unchanged,
    }
}

/// Classify every address in `current` against `previous`
pub fn compare(previous: &Snapshot, current: &Snapshot) -> Vec<BalanceChange> {
    current
        .iter()
        .map(|(address, &balance)| {
            let prior = previous.get(address).copied();
            BalanceChange {
                address: address.clone(),
                kind: classify(prior, balance),
                previous: prior,
                current: balance,
            }
        })
        .collect()
}

/// Log every change and alert decreases through `sink` when one is configured.
/// Delivery failures are logged and do not stop the remaining alerts.
pub async fn report<S: AlertSink>(
    changes: &[BalanceChange],
    metadata: &AccountMetadata,
    sink: Option<&S>,
) {
    for change in changes {
        let message = change.message();

        match change.kind {
            ChangeKind::Decreased => warn!("{}", message),
            ChangeKind::Increased | ChangeKind::New => info!("{}", message),
            ChangeKind::Unchanged => debug!("{}", message),
        }

        if !change.kind.should_alert() {
            continue;
        }
        let Some(sink) = sink else {
            continue;
        };

        if let Err(e) = sink.send(&message).await {
            error!("Failed to send alert for {}: {}", change.address, e);
        }

        let info = metadata.get(&change.address).cloned().unwrap_or_default();
        if let Err(e) = publish_account_info(sink, &change.address, &info).await {
            error!("Failed to send account info for {}: {}", change.address, e);
        }
    }
}

/// Compare two snapshots, report the result and return the classifications
pub async fn compare_and_report<S: AlertSink>(
    previous: &Snapshot,
    current: &Snapshot,
    metadata: &AccountMetadata,
    sink: Option<&S>,
) -> Vec<BalanceChange> {
    let changes = compare(previous, current);
    report(&changes, metadata, sink).await;
    changes
}
