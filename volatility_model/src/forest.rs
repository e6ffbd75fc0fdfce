//! Random forest regressor

use feature_processing::EstimatorParams;
use log::debug;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;
use crate::estimator::{Regressor, check_finite};
use crate::tree::{RegressionTree, TreeSettings};

/// Bagged regression trees; the prediction is the mean over trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Number of trees
    pub n_estimators: usize,
    /// Tree `i` draws its bootstrap sample from a generator seeded with `random_state + i`
    pub random_state: u64,
    /// Worker threads while growing trees (0 = rayon's global pool)
    pub n_jobs: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split (all when `None`)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            random_state: 42,
            n_jobs: 0,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn from_params(params: &EstimatorParams) -> Self {
        Self {
            random_state: params.random_state,
            n_jobs: params.n_jobs,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features,
            ..Self::new(params.n_estimators)
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn tree_settings(&self, n_features: usize) -> TreeSettings {
        TreeSettings {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split.max(2),
            min_samples_leaf: self.min_samples_leaf.max(1),
            max_features: self.max_features.unwrap_or(n_features).clamp(1, n_features),
        }
    }

    fn grow_trees(&self, x: &Array2<f64>, y: &Array1<f64>) -> Vec<RegressionTree> {
        let n_samples = x.nrows();
        let settings = self.tree_settings(x.ncols());

        (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(tree_idx as u64));
                let rows: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                RegressionTree::grow(x, y, &rows, &settings, &mut rng)
            })
            .collect()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EstimatorError> {
        if x.nrows() != y.len() {
            return Err(EstimatorError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(EstimatorError::InvalidData(format!(
                "cannot fit on a {}x{} matrix",
                x.nrows(),
                x.ncols()
            )));
        }
        if self.n_estimators == 0 {
            return Err(EstimatorError::InvalidData("n_estimators must be at least 1".to_string()));
        }
        check_finite(x, Some(y))?;

        let trees = if self.n_jobs > 0 {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(self.n_jobs).build()?;
            pool.install(|| self.grow_trees(x, y))
        } else {
            self.grow_trees(x, y)
        };

        debug!(
            "Grew {} trees on {} samples x {} features",
            trees.len(),
            x.nrows(),
            x.ncols()
        );
        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError> {
        if self.trees.is_empty() {
            return Err(EstimatorError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(EstimatorError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        check_finite(x, None)?;

        let n_trees = self.trees.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|tree| tree.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regressor() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForestRegressor::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 2.0, "MSE too high: {}", mse);
    }

    #[test]
    fn same_seed_same_forest() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| (i % 5) as f64 * 0.1);

        let mut a = RandomForestRegressor::new(5).with_random_state(9).with_n_jobs(2);
        let mut b = RandomForestRegressor::new(5).with_random_state(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn without_bootstrap_a_tree_interpolates_training_data() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.5, 0.1, 0.9, 0.3];

        let mut rf = RandomForestRegressor::new(1).with_bootstrap(false);
        rf.fit(&x, &y).unwrap();

        assert_eq!(rf.predict(&x).unwrap(), y);
    }

    #[test]
    fn constant_target_predicts_constant() {
        let x = array![[0.3, 1.0], [0.1, 2.0], [0.7, 3.0]];
        let y = array![0.0, 0.0, 0.0];

        let mut rf = RandomForestRegressor::new(4);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&array![[5.0, 5.0], [-1.0, 0.0]]).unwrap();
        assert!(predictions.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn feature_subsampling_still_fits() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(30, |i| if i < 15 { 0.0 } else { 1.0 });

        let mut rf = RandomForestRegressor::new(8).with_max_features(1);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        assert_eq!(rf.n_trees(), 8);
        assert!(predictions.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn predict_before_fit_fails() {
        let rf = RandomForestRegressor::new(2);
        assert!(matches!(
            rf.predict(&array![[1.0]]),
            Err(EstimatorError::NotFitted)
        ));
    }

    #[test]
    fn rejects_mismatched_and_non_finite_inputs() {
        let mut rf = RandomForestRegressor::new(2);
        assert!(matches!(
            rf.fit(&array![[1.0], [2.0]], &array![1.0]),
            Err(EstimatorError::ShapeError { .. })
        ));
        assert!(matches!(
            rf.fit(&array![[1.0], [f64::NAN]], &array![1.0, 2.0]),
            Err(EstimatorError::InvalidData(_))
        ));

        rf.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            rf.predict(&array![[1.0, 2.0]]),
            Err(EstimatorError::ShapeError { .. })
        ));
    }

    #[test]
    fn from_params_copies_hyperparameters() {
        let params = EstimatorParams::default();
        let rf = RandomForestRegressor::from_params(&params);
        assert_eq!(rf.n_estimators, 10);
        assert_eq!(rf.random_state, 42);
        assert_eq!(rf.n_jobs, 25);
        assert!(!rf.is_fitted());
    }
}
