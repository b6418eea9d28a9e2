use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{AccountInfo, AccountMetadata, Address};
use std::path::Path;
use tracing::{info, warn};

const ADDRESS_COLUMN: &str = "address";

/// Monitored accounts loaded from the input CSV
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    /// Addresses in first-seen file order
    pub addresses: Vec<Address>,
    pub metadata: AccountMetadata,
}

impl AccountRegistry {
    /// Load the registry. The header must contain an `address` column; every
    /// other column is kept as metadata for that address.
    pub fn load<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let path = path.as_ref();
        info!("Loading monitored accounts from {:?}", path);

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();

        let address_idx = headers
            .iter()
            .position(|h| h.trim() == ADDRESS_COLUMN)
            .ok_or_else(|| MonitorError::ParseError {
                path: path.display().to_string(),
                reason: format!("missing `{}` column", ADDRESS_COLUMN),
            })?;

        let mut registry = AccountRegistry::default();

        for (row, result) in reader.records().enumerate() {
            let record = result?;

            let address = match record.get(address_idx).map(str::trim) {
                Some(a) if !a.is_empty() => a.to_string(),
                _ => {
                    warn!("Skipping row {} of {:?}: no address", row + 1, path);
                    continue;
                }
            };

            let fields = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(idx, _)| *idx != address_idx)
                .map(|(_, (key, value))| (key.to_string(), value.to_string()))
                .collect();

            if registry
                .metadata
                .insert(address.clone(), AccountInfo::new(fields))
                .is_some()
            {
                warn!("Duplicate address {} in {:?}, keeping last row", address, path);
            } else {
                registry.addresses.push(address);
            }
        }

        info!("Monitoring {} accounts", registry.addresses.len());
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Metadata for an address, empty if it has none
    pub fn info(&self, address: &str) -> AccountInfo {
        self.metadata.get(address).cloned().unwrap_or_default()
    }
}
