pub mod config;
pub mod error;
pub mod features;
pub mod interval;
pub mod sampler;
pub mod volatility;

pub use config::{EstimatorParams, FillMethod, TechnicalIndicator, VolatilityConfig};
pub use error::FeatureError;
pub use features::{BuildMode, FeatureBuilder, FeatureSet};
pub use interval::Interval;
pub use volatility::VolatilityEstimator;
