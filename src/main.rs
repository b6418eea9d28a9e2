use account_monitor::{BalanceMonitor, ConfigOverrides, create_default_config, load_config};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{Level, error, info};

/// Watch account balances and alert a webhook when they drop
#[derive(Parser, Debug)]
#[command(name = "account-monitor", version)]
#[command(about = "Poll Solana account balances and alert on decreases", long_about = None)]
struct Args {
    /// Optional TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default configuration file to --config and exit
    #[arg(long, requires = "config")]
    init_config: bool,

    /// RPC endpoint to target [default: http://api.mainnet-beta.solana.com]
    #[arg(short = 'u', long)]
    rpc_url: Option<String>,

    /// Webhook URL to receive monitoring alerts
    #[arg(short = 'w', long = "slack-webhook-url", alias = "webhook-url")]
    webhook_url: Option<String>,

    /// CSV file with an `address` column listing the accounts to monitor [default: accounts.csv]
    #[arg(short, long)]
    input_file: Option<PathBuf>,

    /// CSV file that will hold the latest balance of every account in SOL [default: latest_balances.csv]
    #[arg(short, long)]
    output_file: Option<PathBuf>,

    /// Number of seconds between balance checks [default: 60]
    #[arg(long = "balance-check-interval")]
    balance_check_interval: Option<u64>,

    /// Number of seconds between liveness checks [default: 3600]
    #[arg(long = "liveness-check-interval")]
    liveness_check_interval: Option<u64>,

    /// Log level: trace, debug, info, warn, error [default: info]
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            rpc_url: self.rpc_url.clone(),
            webhook_url: self.webhook_url.clone(),
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
            balance_check_interval_secs: self.balance_check_interval,
            liveness_check_interval_secs: self.liveness_check_interval,
            log_level: self.log_level.clone(),
        }
    }
}

fn max_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt().with_max_level(max_level(level)).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        init_logging("info");
        if let Some(path) = &args.config {
            create_default_config(path)?;
            info!("Please edit {:?} and restart", path);
        }
        return Ok(());
    }

    let config = load_config(args.config.as_deref(), args.overrides())
        .context("Failed to load configuration")?;
    init_logging(&config.log_level);

    info!("Starting account monitor");
    info!("Input file: {:?}", config.input_file);
    info!("Output file: {:?}", config.output_file);

    let monitor = BalanceMonitor::from_config(config).context("Failed to initialise monitor")?;

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = &result {
                error!("Monitor stopped: {}", e);
            }
            result.context("Monitor failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down...");
    Ok(())
}
