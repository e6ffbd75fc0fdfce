use config;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataIngestionError {
    #[error("CSV read error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config not found: {0}")]
    ConfigValueNotFoundError(#[from] config::ConfigError),

    #[error("Cannot parse timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("Invalid bar at {timestamp}: {reason}")]
    InvalidBar { timestamp: String, reason: String },

    #[error("Duplicate bar timestamp {0}")]
    DuplicateTimestamp(String),
}
