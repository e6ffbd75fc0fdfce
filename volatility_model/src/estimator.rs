use ndarray::{Array1, Array2};

use crate::error::EstimatorError;

/// A regression estimator mapping feature rows to one scalar each.
pub trait Regressor: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EstimatorError>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError>;
}

pub(crate) fn check_finite(x: &Array2<f64>, y: Option<&Array1<f64>>) -> Result<(), EstimatorError> {
    if x.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::InvalidData("features contain non-finite values".to_string()));
    }
    if let Some(y) = y {
        if y.iter().any(|v| !v.is_finite()) {
            return Err(EstimatorError::InvalidData("targets contain non-finite values".to_string()));
        }
    }
    Ok(())
}
