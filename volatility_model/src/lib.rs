pub mod error;
pub mod estimator;
pub mod forest;
pub mod model;
pub mod store;
pub mod tree;

pub use error::{EstimatorError, ModelError};
pub use estimator::Regressor;
pub use forest::RandomForestRegressor;
pub use model::{Model, RealizedVolatilityModel};
pub use store::{FileStore, MemoryStore, ModelStore, StoreConfig};
