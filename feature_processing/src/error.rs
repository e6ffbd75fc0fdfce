use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data frame error: {0}")]
    PolarsError(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, FeatureError>;
