pub mod alerts;
pub mod config;
pub mod detection;
pub mod monitor;
pub mod registry;
pub mod store;
pub mod types;

pub use alerts::{AlertSink, WebhookSink};
pub use config::{ConfigOverrides, create_default_config, load_config};
pub use detection::{BalanceChange, compare, compare_and_report};
pub use monitor::{BalanceMonitor, MonitorError, MonitorResult, MonitorState};
pub use registry::AccountRegistry;
pub use types::{AccountMetadata, Address, Balance, ChangeKind, MonitorConfig, Snapshot};
