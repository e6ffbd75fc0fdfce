use feature_processing::FeatureError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("Estimator has not been fitted")]
    NotFitted,

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid estimator input: {0}")]
    InvalidData(String),

    #[error("Cannot build worker pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Feature(FeatureError),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Estimator failure: {0}")]
    Estimator(#[from] EstimatorError),

    #[error("Model {0} has not been trained")]
    NotTrained(String),

    #[error("Saved model {name} was trained on {saved:?}, configuration produces {configured:?}")]
    FeatureMismatch {
        name: String,
        saved: Vec<String>,
        configured: Vec<String>,
    },

    #[error("Model store error: {0}")]
    StoreError(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Data frame error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Short input is reported as `InsufficientData` whichever stage detects it.
impl From<FeatureError> for ModelError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientData(reason) => ModelError::InsufficientData(reason),
            other => ModelError::Feature(other),
        }
    }
}
