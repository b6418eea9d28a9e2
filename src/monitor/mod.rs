pub mod error;
pub mod fetcher;
pub mod runner;

pub use error::{MonitorError, MonitorResult};
pub use fetcher::{AccountSource, BalanceFetcher, MAX_ADDRESSES_PER_REQUEST, RpcAccountSource};
pub use runner::{BalanceMonitor, MonitorState};
