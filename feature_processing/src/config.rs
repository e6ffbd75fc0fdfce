use config::ConfigError;
use data_ingestion::config::load_section;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{FeatureError, Result};
use crate::interval::Interval;

/// Missing-value policy applied to raw bar columns before feature computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillMethod {
    /// Forward fill, then backward fill the leading gap.
    #[serde(rename = "ffill", alias = "forward")]
    Forward,
    /// Backward fill, then forward fill the trailing gap.
    #[serde(rename = "bfill", alias = "backward")]
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TechnicalIndicator {
    Sma(usize),
    Ema(usize),
}

impl TechnicalIndicator {
    pub fn window(&self) -> usize {
        match self {
            TechnicalIndicator::Sma(window) | TechnicalIndicator::Ema(window) => *window,
        }
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TechnicalIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TechnicalIndicator::Sma(window) => write!(f, "SMA_{}", window),
            TechnicalIndicator::Ema(window) => write!(f, "EMA_{}", window),
        }
    }
}

impl FromStr for TechnicalIndicator {
    type Err = FeatureError;

    fn from_str(raw: &str) -> Result<Self> {
        let unknown = || FeatureError::InvalidConfiguration(format!("unknown technical indicator {:?}", raw));
        let (kind, window) = raw.trim().split_once('_').ok_or_else(unknown)?;
        let window: usize = window.parse().map_err(|_| unknown())?;
        match kind.to_ascii_uppercase().as_str() {
            "SMA" => Ok(TechnicalIndicator::Sma(window)),
            "EMA" => Ok(TechnicalIndicator::Ema(window)),
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for TechnicalIndicator {
    type Error = FeatureError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TechnicalIndicator> for String {
    fn from(value: TechnicalIndicator) -> Self {
        value.to_string()
    }
}

/// Hyperparameters handed to the regression estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorParams {
    pub n_estimators: usize,
    pub random_state: u64,
    /// Worker threads used while growing trees; 0 uses the global pool.
    pub n_jobs: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried at each split; `None` tries all of them.
    pub max_features: Option<usize>,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            random_state: 42,
            n_jobs: 25,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub estimator_params: EstimatorParams,
    pub candle_interval: Interval,
    pub volatility_window: Interval,
    pub n_lags: usize,
    pub ma_window: usize,
    pub target_shift: usize,
    pub fillna_method: FillMethod,
    pub technical_indicators: Vec<TechnicalIndicator>,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            estimator_params: EstimatorParams::default(),
            candle_interval: Interval::minutes(1),
            volatility_window: Interval::minutes(5),
            n_lags: 4,
            ma_window: 10,
            target_shift: 5,
            fillna_method: FillMethod::Forward,
            technical_indicators: vec![TechnicalIndicator::Sma(10), TechnicalIndicator::Ema(10)],
        }
    }
}

impl VolatilityConfig {
    /// Reads the `[volatility]` table of a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        load_section(path, "volatility")
    }

    /// Bars per volatility window: `floor(volatility_window / candle_interval)`.
    pub fn window_points(&self) -> Result<usize> {
        let points = self.volatility_window.whole_multiples_of(&self.candle_interval);
        if points == 0 {
            return Err(FeatureError::InvalidConfiguration(format!(
                "volatility window {} is shorter than one {} candle",
                self.volatility_window, self.candle_interval
            )));
        }
        Ok(points)
    }

    pub fn validate(&self) -> Result<()> {
        self.window_points()?;

        for (name, value) in [
            ("n_lags", self.n_lags),
            ("ma_window", self.ma_window),
            ("target_shift", self.target_shift),
        ] {
            if value == 0 {
                return Err(FeatureError::InvalidConfiguration(format!("{} must be at least 1", name)));
            }
        }

        if self.technical_indicators.is_empty() {
            return Err(FeatureError::InvalidConfiguration(
                "at least one technical indicator is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for indicator in &self.technical_indicators {
            if indicator.window() != self.ma_window {
                return Err(FeatureError::InvalidConfiguration(format!(
                    "{} does not match ma_window {}",
                    indicator, self.ma_window
                )));
            }
            if !seen.insert(*indicator) {
                return Err(FeatureError::InvalidConfiguration(format!("{} listed twice", indicator)));
            }
        }

        if self.estimator_params.n_estimators == 0 {
            return Err(FeatureError::InvalidConfiguration(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => info!("Realized volatility configuration:\n{}", json),
            Err(e) => info!("Realized volatility configuration: {:?} ({})", self, e),
        }
    }
}
