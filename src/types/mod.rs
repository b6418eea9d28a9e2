use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Account address as it appears in the registry file (base58 pubkey)
pub type Address = String;

/// Balance in SOL
pub type Balance = f64;

/// Latest known balance per address, iterated in address order
pub type Snapshot = BTreeMap<Address, Balance>;

/// Registry metadata per address
pub type AccountMetadata = HashMap<Address, AccountInfo>;

/// Lamports per SOL, used to convert RPC balances
pub const LAMPORTS_PER_SOL: u64 = solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Convert a lamport amount to SOL
pub fn lamports_to_sol(lamports: u64) -> Balance {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Extra registry columns for one account, in file column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub fields: Vec<(String, String)>,
}

impl AccountInfo {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of comparing one address between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Decreased,
    Increased,
    Unchanged,
    /// Address had no entry in the previous snapshot
    New,
}

impl ChangeKind {
    /// Only decreases are forwarded to the alert sink
    pub fn should_alert(&self) -> bool {
        matches!(self, ChangeKind::Decreased)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Decreased => write!(f, "Decreased"),
            ChangeKind::Increased => write!(f, "Increased"),
            ChangeKind::Unchanged => write!(f, "Unchanged"),
            ChangeKind::New => write!(f, "New"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// JSON-RPC endpoint queried for balances
    pub rpc_url: String,

    /// Incoming webhook receiving alerts; alerts are only logged when unset
    pub webhook_url: Option<String>,

    /// Registry CSV with an `address` column
    pub input_file: PathBuf,

    /// Snapshot CSV rewritten after every successful poll
    pub output_file: PathBuf,

    /// Seconds between balance checks
    pub balance_check_interval_secs: u64,

    /// Seconds between liveness announcements
    pub liveness_check_interval_secs: u64,

    /// Logging level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://api.mainnet-beta.solana.com".to_string(),
            webhook_url: None,
            input_file: PathBuf::from("accounts.csv"),
            output_file: PathBuf::from("latest_balances.csv"),
            balance_check_interval_secs: 60,
            liveness_check_interval_secs: 3600,
            log_level: "info".to_string(),
        }
    }
}
