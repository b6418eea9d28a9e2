use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Invalid account address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("RPC error: {0}")]
    RpcError(#[from] solana_client::client_error::ClientError),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request to webhook returned an error {status}, the response is:\n{body}")]
    WebhookRejected { status: u16, body: String },
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;
