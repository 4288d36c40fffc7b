use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("PowerFlex API error: {0}")]
    PowerFlexApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Bulk metrics batch failed: {0}")]
    BulkBatch(String),

    #[error("Leader election error: {0}")]
    LeaderElection(String),

    #[error("Metric registration error: {0}")]
    Registration(#[from] prometheus::Error),

    #[error("Instrument creation failed: {0}")]
    Instrument(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExporterError>;
