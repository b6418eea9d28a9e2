use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::MonitorConfig;
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    monitor: RawMonitorConfig,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawMonitorConfig {
    rpc_url: Option<String>,
    webhook_url: Option<String>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    balance_check_interval_secs: Option<u64>,
    liveness_check_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct LoggingConfig {
    level: Option<String>,
}

/// Values given on the command line; these win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub rpc_url: Option<String>,
    pub webhook_url: Option<String>,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub balance_check_interval_secs: Option<u64>,
    pub liveness_check_interval_secs: Option<u64>,
    pub log_level: Option<String>,
}

/// Build the monitor configuration from defaults, an optional TOML file and
/// command line overrides, in increasing priority
pub fn load_config(path: Option<&Path>, overrides: ConfigOverrides) -> MonitorResult<MonitorConfig> {
    let raw = match path {
        Some(path) => read_raw_config(path)?,
        None => RawConfig::default(),
    };

    let defaults = MonitorConfig::default();
    let file = raw.monitor;
    let file_level = raw.logging.and_then(|l| l.level);

    let config = MonitorConfig {
        rpc_url: overrides.rpc_url.or(file.rpc_url).unwrap_or(defaults.rpc_url),
        webhook_url: overrides
            .webhook_url
            .or(file.webhook_url)
            .filter(|url| !url.trim().is_empty()),
        input_file: overrides
            .input_file
            .or(file.input_file)
            .unwrap_or(defaults.input_file),
        output_file: overrides
            .output_file
            .or(file.output_file)
            .unwrap_or(defaults.output_file),
        balance_check_interval_secs: overrides
            .balance_check_interval_secs
            .or(file.balance_check_interval_secs)
            .unwrap_or(defaults.balance_check_interval_secs),
        liveness_check_interval_secs: overrides
            .liveness_check_interval_secs
            .or(file.liveness_check_interval_secs)
            .unwrap_or(defaults.liveness_check_interval_secs),
        log_level: overrides
            .log_level
            .or(file_level)
            .unwrap_or(defaults.log_level)
            .to_lowercase(),
    };

    validate(&config)?;
    Ok(config)
}

fn read_raw_config(path: &Path) -> MonitorResult<RawConfig> {
    info!("Loading configuration from {:?}", path);

    let config = Config::builder()
        .add_source(File::from(path).format(FileFormat::Toml))
        .build()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to load config: {}", e)))?;

    config
        .try_deserialize()
        .map_err(|e| MonitorError::ConfigError(format!("Failed to parse config: {}", e)))
}

fn validate_http_url(name: &str, value: &str) -> MonitorResult<()> {
    let url = Url::parse(value)
        .map_err(|e| MonitorError::ConfigError(format!("Invalid {} {}: {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(MonitorError::ConfigError(format!(
            "Invalid {} (must start with http:// or https://): {}",
            name, value
        )));
    }
    Ok(())
}

fn validate(config: &MonitorConfig) -> MonitorResult<()> {
    validate_http_url("RPC URL", &config.rpc_url)?;

    if let Some(webhook_url) = &config.webhook_url {
        validate_http_url("webhook URL", webhook_url)?;
    }

    if config.balance_check_interval_secs == 0 {
        return Err(MonitorError::ConfigError(
            "Balance check interval must be at least 1 second".to_string(),
        ));
    }

    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(MonitorError::ConfigError(format!(
            "Invalid log level {} (expected one of {})",
            config.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    Ok(())
}

/// Create a default configuration file
pub fn create_default_config<P: AsRef<Path>>(path: P) -> MonitorResult<()> {
    let defaults = MonitorConfig::default();
    let raw = RawConfig {
        monitor: RawMonitorConfig {
            rpc_url: Some(defaults.rpc_url),
            webhook_url: None,
            input_file: Some(defaults.input_file),
            output_file: Some(defaults.output_file),
            balance_check_interval_secs: Some(defaults.balance_check_interval_secs),
            liveness_check_interval_secs: Some(defaults.liveness_check_interval_secs),
        },
        logging: Some(LoggingConfig {
            level: Some(defaults.log_level),
        }),
    };

    let body = toml::to_string_pretty(&raw)
        .map_err(|e| MonitorError::ConfigError(format!("Failed to render config: {}", e)))?;

    let contents = format!(
        "# account-monitor configuration\n\
         # Add `webhook_url = \"https://hooks.slack.com/services/...\"` under [monitor]\n\
         # to receive alerts. Command line flags override these values.\n\n{}",
        body
    );

    std::fs::write(path.as_ref(), contents)
        .map_err(|e| MonitorError::ConfigError(format!("Failed to write config file: {}", e)))?;

    info!("Created default config file at {:?}", path.as_ref());
    Ok(())
}
