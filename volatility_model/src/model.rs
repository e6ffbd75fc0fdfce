use data_ingestion::bar::Bar;
use feature_processing::features::{CLOSE, TARGET_VOLATILITY};
use feature_processing::{BuildMode, FeatureBuilder, VolatilityConfig, sampler};
use log::info;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ModelError;
use crate::estimator::Regressor;
use crate::forest::RandomForestRegressor;
use crate::store::ModelStore;

pub const PREDICTION: &str = "prediction";
pub const FORECAST: &str = "forecast";

/// Train / predict capability shared by every model family.
pub trait Model {
    fn name(&self) -> &str;

    fn train(&mut self, bars: &[Bar]) -> Result<(), ModelError>;

    /// One `prediction` row per input bar, in input order.
    fn inference(&self, bars: &[Bar]) -> Result<DataFrame, ModelError>;

    fn forecast(&self, steps: usize) -> Result<DataFrame, ModelError>;
}

#[derive(Serialize, Deserialize)]
struct SavedModel<E> {
    feature_names: Vec<String>,
    estimator: E,
}

/// Predicts the realized volatility `target_shift` bars ahead.
///
/// Training keeps one row per volatility window; inference scores every bar.
pub struct RealizedVolatilityModel<E> {
    name: String,
    builder: FeatureBuilder,
    prototype: E,
    fitted: Option<E>,
    store: Arc<dyn ModelStore>,
}

impl RealizedVolatilityModel<RandomForestRegressor> {
    /// Forest configured from `config.estimator_params`.
    pub fn random_forest(
        name: &str,
        config: VolatilityConfig,
        store: Arc<dyn ModelStore>,
    ) -> Result<Self, ModelError> {
        let estimator = RandomForestRegressor::from_params(&config.estimator_params);
        Self::new(name, config, estimator, store)
    }
}

impl<E> RealizedVolatilityModel<E>
where
    E: Regressor + Clone + Serialize + DeserializeOwned,
{
    /// `estimator` is the unfitted template cloned on every `train` call.
    pub fn new(
        name: &str,
        config: VolatilityConfig,
        estimator: E,
        store: Arc<dyn ModelStore>,
    ) -> Result<Self, ModelError> {
        Ok(Self {
            name: name.to_string(),
            builder: FeatureBuilder::new(config)?,
            prototype: estimator,
            fitted: None,
            store,
        })
    }

    /// Restores a model saved under `name`. The saved feature layout must match `config`.
    pub fn load(
        name: &str,
        config: VolatilityConfig,
        estimator: E,
        store: Arc<dyn ModelStore>,
    ) -> Result<Self, ModelError> {
        let mut model = Self::new(name, config, estimator, store)?;
        let saved: SavedModel<E> = bincode::deserialize(&model.store.load(name)?)?;

        let configured = model.feature_names();
        if saved.feature_names != configured {
            return Err(ModelError::FeatureMismatch {
                name: name.to_string(),
                saved: saved.feature_names,
                configured,
            });
        }
        model.fitted = Some(saved.estimator);
        info!("Loaded trained model {}", name);
        Ok(model)
    }

    pub fn config(&self) -> &VolatilityConfig {
        self.builder.config()
    }

    pub fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn estimator(&self) -> Option<&E> {
        self.fitted.as_ref()
    }

    /// Estimator input columns: the builder's features followed by `close`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.builder.feature_names();
        names.push(CLOSE.to_string());
        names
    }

    fn save(&self, estimator: &E) -> Result<(), ModelError> {
        let saved = SavedModel {
            feature_names: self.feature_names(),
            estimator,
        };
        let bytes = bincode::serialize(&saved)?;
        self.store.save(&self.name, &bytes)?;
        Ok(())
    }
}

impl<E> Model for RealizedVolatilityModel<E>
where
    E: Regressor + Clone + Serialize + DeserializeOwned,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn train(&mut self, bars: &[Bar]) -> Result<(), ModelError> {
        let features = self.builder.build(bars, BuildMode::Train)?;
        let names = self.feature_names();

        let mut required = names.clone();
        required.push(TARGET_VOLATILITY.to_string());
        let sampled = sampler::sample(&features.frame, self.builder.window_points(), &required)?;
        if sampled.height() == 0 {
            return Err(ModelError::InsufficientData(format!(
                "no complete training rows left from {} bars",
                bars.len()
            )));
        }

        let x = to_matrix(&sampled, &names)?;
        let y = to_vector(&sampled, TARGET_VOLATILITY)?;

        let mut estimator = self.prototype.clone();
        estimator.fit(&x, &y)?;
        info!(
            "Trained {} on {} windows x {} features",
            self.name,
            x.nrows(),
            x.ncols()
        );

        self.save(&estimator)?;
        self.fitted = Some(estimator);
        Ok(())
    }

    fn inference(&self, bars: &[Bar]) -> Result<DataFrame, ModelError> {
        let estimator = self
            .fitted
            .as_ref()
            .ok_or_else(|| ModelError::NotTrained(self.name.clone()))?;
        let features = self.builder.build(bars, BuildMode::Inference)?;
        let names = self.feature_names();

        // zero, not forward fill: leading lags and SMA stay defined at every bar
        let filled = features
            .frame
            .lazy()
            .select(
                names
                    .iter()
                    .map(|name| col(name.as_str()).fill_null(lit(0.0)))
                    .collect::<Vec<_>>(),
            )
            .collect()?;

        let predictions = estimator.predict(&to_matrix(&filled, &names)?)?;
        Ok(DataFrame::new(vec![Series::new(
            PREDICTION.into(),
            predictions.to_vec(),
        )])?)
    }

    /// Placeholder: `steps` zeros, independent of any training.
    fn forecast(&self, steps: usize) -> Result<DataFrame, ModelError> {
        Ok(DataFrame::new(vec![Series::new(FORECAST.into(), vec![0.0f64; steps])])?)
    }
}

/// Stacks `names` columns of `frame` into a row-major matrix; nulls become `NaN`.
fn to_matrix(frame: &DataFrame, names: &[String]) -> Result<Array2<f64>, ModelError> {
    let mut x = Array2::zeros((frame.height(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let values = frame.column(name)?.f64()?;
        for (i, value) in values.into_iter().enumerate() {
            x[[i, j]] = value.unwrap_or(f64::NAN);
        }
    }
    Ok(x)
}

fn to_vector(frame: &DataFrame, name: &str) -> Result<Array1<f64>, ModelError> {
    let values = frame.column(name)?.f64()?;
    Ok(values.into_iter().map(|value| value.unwrap_or(f64::NAN)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EstimatorError;
    use crate::store::MemoryStore;
    use chrono::{TimeDelta, TimeZone, Utc};

    /// Predicts the training mean; `fail` makes `fit` return an error.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct MeanRegressor {
        fail: bool,
        mean: Option<f64>,
    }

    impl Regressor for MeanRegressor {
        fn fit(&mut self, _x: &Array2<f64>, y: &Array1<f64>) -> Result<(), EstimatorError> {
            if self.fail {
                return Err(EstimatorError::InvalidData("mean regressor refused to fit".to_string()));
            }
            self.mean = y.mean();
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, EstimatorError> {
            self.mean
                .map(|mean| Array1::from_elem(x.nrows(), mean))
                .ok_or(EstimatorError::NotFitted)
        }
    }

    fn mean_model(fail: bool, store: Arc<MemoryStore>) -> RealizedVolatilityModel<MeanRegressor> {
        let estimator = MeanRegressor { fail, mean: None };
        RealizedVolatilityModel::new("mean", VolatilityConfig::default(), estimator, store).unwrap()
    }

    fn bars(n: usize) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 50.0 + (i % 9) as f64 * 0.3 - (i % 4) as f64 * 0.2;
                Bar::flat(start + TimeDelta::minutes(i as i64), close, 200.0 + (i % 5) as f64)
            })
            .collect()
    }

    fn small_forest_config() -> VolatilityConfig {
        let mut config = VolatilityConfig::default();
        config.estimator_params.n_estimators = 3;
        config.estimator_params.n_jobs = 1;
        config
    }

    #[test]
    fn forecast_is_zeros() {
        let model =
            RealizedVolatilityModel::random_forest("vol", small_forest_config(), Arc::new(MemoryStore::new())).unwrap();
        let forecast = model.forecast(4).unwrap();

        assert_eq!(forecast.height(), 4);
        let values: Vec<Option<f64>> = forecast.column(FORECAST).unwrap().f64().unwrap().into_iter().collect();
        assert!(values.iter().all(|v| *v == Some(0.0)));
        assert_eq!(model.forecast(0).unwrap().height(), 0);
    }

    #[test]
    fn inference_requires_training() {
        let model =
            RealizedVolatilityModel::random_forest("vol", small_forest_config(), Arc::new(MemoryStore::new())).unwrap();
        assert!(matches!(model.inference(&bars(30)), Err(ModelError::NotTrained(_))));
    }

    #[test]
    fn estimator_inputs_end_with_close() {
        let model =
            RealizedVolatilityModel::random_forest("vol", small_forest_config(), Arc::new(MemoryStore::new())).unwrap();
        let names = model.feature_names();

        assert_eq!(names.len(), 12);
        assert_eq!(names.last().map(String::as_str), Some(CLOSE));
    }

    #[test]
    fn trains_and_scores_every_bar() {
        let store = Arc::new(MemoryStore::new());
        let mut model = RealizedVolatilityModel::random_forest("vol", small_forest_config(), store.clone()).unwrap();
        model.train(&bars(80)).unwrap();

        assert!(model.is_trained());
        assert_eq!(store.save_count(), 1);

        let predictions = model.inference(&bars(17)).unwrap();
        assert_eq!(predictions.height(), 17);
        let values = predictions.column(PREDICTION).unwrap().f64().unwrap();
        assert!(values.into_iter().all(|v| v.is_some_and(|p| p.is_finite() && p >= 0.0)));
    }

    #[test]
    fn load_rejects_a_different_feature_layout() {
        let store = Arc::new(MemoryStore::new());
        let mut model = RealizedVolatilityModel::random_forest("vol", small_forest_config(), store.clone()).unwrap();
        model.train(&bars(80)).unwrap();

        let mut other = small_forest_config();
        other.n_lags = 2;
        let estimator = RandomForestRegressor::from_params(&other.estimator_params);
        assert!(matches!(
            RealizedVolatilityModel::load("vol", other, estimator, store),
            Err(ModelError::FeatureMismatch { .. })
        ));
    }

    #[test]
    fn fit_failure_propagates_without_saving() {
        let store = Arc::new(MemoryStore::new());
        let mut model = mean_model(true, store.clone());

        let err = model.train(&bars(80)).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Estimator(EstimatorError::InvalidData(ref reason)) if reason == "mean regressor refused to fit"
        ));
        assert_eq!(store.save_count(), 0);
        assert!(!model.is_trained());
    }

    #[test]
    fn fit_failure_keeps_the_previous_fit() {
        let store = Arc::new(MemoryStore::new());
        let mut model = mean_model(false, store.clone());
        model.train(&bars(80)).unwrap();
        let before = model.estimator().and_then(|estimator| estimator.mean);
        assert!(before.is_some());

        model.prototype.fail = true;
        assert!(matches!(model.train(&bars(60)), Err(ModelError::Estimator(_))));

        assert_eq!(store.save_count(), 1);
        assert_eq!(model.estimator().and_then(|estimator| estimator.mean), before);
        assert!(model.inference(&bars(20)).is_ok());
    }

    #[test]
    fn short_input_is_one_insufficient_data_variant() {
        let store = Arc::new(MemoryStore::new());
        let mut model = mean_model(false, store);

        assert!(matches!(model.train(&bars(3)), Err(ModelError::InsufficientData(_))));

        model.train(&bars(80)).unwrap();
        assert!(matches!(model.inference(&bars(2)), Err(ModelError::InsufficientData(_))));
    }
}
