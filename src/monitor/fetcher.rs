use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{Address, Snapshot, lamports_to_sol};
use solana_account_decoder::UiAccountEncoding;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcAccountInfoConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Upper bound on addresses per `getMultipleAccounts` request
pub const MAX_ADDRESSES_PER_REQUEST: usize = 100;

const RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Something that can answer a batched account lookup
#[allow(async_fn_in_trait)]
pub trait AccountSource {
    /// Lamports held by each address, in request order. `None` means the
    /// account does not exist on-chain.
    async fn get_lamports(&self, addresses: &[Address]) -> MonitorResult<Vec<Option<u64>>>;
}

/// `getMultipleAccounts` over JSON-RPC
pub struct RpcAccountSource {
    rpc_client: RpcClient,
}

impl RpcAccountSource {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_client: RpcClient::new_with_timeout(rpc_url.into(), RPC_TIMEOUT),
        }
    }

    pub fn url(&self) -> String {
        self.rpc_client.url()
    }
}

fn parse_pubkeys(addresses: &[Address]) -> MonitorResult<Vec<Pubkey>> {
    addresses
        .iter()
        .map(|address| {
            Pubkey::from_str(address).map_err(|e| MonitorError::InvalidAddress {
                address: address.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

impl AccountSource for RpcAccountSource {
    async fn get_lamports(&self, addresses: &[Address]) -> MonitorResult<Vec<Option<u64>>> {
        let pubkeys = parse_pubkeys(addresses)?;

        let config = RpcAccountInfoConfig {
            encoding: Some(UiAccountEncoding::Base64),
            ..RpcAccountInfoConfig::default()
        };

        let response = self
            .rpc_client
            .get_multiple_accounts_with_config(&pubkeys, config)
            .await?;

        Ok(response
            .value
            .into_iter()
            .map(|account| account.map(|a| a.lamports))
            .collect())
    }
}

/// Fetches a full balance snapshot in bounded batches
pub struct BalanceFetcher<A> {
    source: A,
}

impl<A: AccountSource> BalanceFetcher<A> {
    pub fn new(source: A) -> Self {
        Self { source }
    }

    /// Fetch the balance of every address. Any failed batch fails the whole
    /// fetch; partial snapshots are never returned.
    pub async fn fetch(&self, addresses: &[Address]) -> MonitorResult<Snapshot> {
        let mut snapshot = Snapshot::new();

        for (i, batch) in addresses.chunks(MAX_ADDRESSES_PER_REQUEST).enumerate() {
            debug!("Requesting batch {} ({} addresses)", i, batch.len());

            let lamports = self.source.get_lamports(batch).await?;

            if lamports.len() != batch.len() {
                return Err(MonitorError::InvalidResponse(format!(
                    "requested {} accounts but received {}",
                    batch.len(),
                    lamports.len()
                )));
            }

            for (address, amount) in batch.iter().zip(lamports) {
                let balance = amount.map(lamports_to_sol).unwrap_or(0.0);
                snapshot.insert(address.clone(), balance);
            }
        }

        Ok(snapshot)
    }
}
