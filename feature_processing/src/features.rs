use data_ingestion::bar::Bar;
use log::debug;
use polars::prelude::*;

use crate::config::{FillMethod, TechnicalIndicator, VolatilityConfig};
use crate::error::{FeatureError, Result};
use crate::volatility::VolatilityEstimator;

pub const TIMESTAMP: &str = "timestamp";
pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const LOG_RETURN: &str = "log_return";
pub const CURRENT_VOLATILITY: &str = "current_volatility";
pub const TARGET_VOLATILITY: &str = "target_volatility";

pub fn log_return_lag_name(lag: usize) -> String {
    format!("log_return_lag_{}", lag)
}

pub fn volume_lag_name(lag: usize) -> String {
    format!("volume_lag_{}", lag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Adds the forward-shifted `target_volatility` column.
    Train,
    Inference,
}

/// Enriched bar table plus the ordered names of its feature columns.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub frame: DataFrame,
    pub feature_names: Vec<String>,
}

/// Turns raw bars into lagged returns, lagged volumes, moving averages and
/// realized volatility, one row per bar.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    config: VolatilityConfig,
    volatility: VolatilityEstimator,
}

impl FeatureBuilder {
    pub fn new(config: VolatilityConfig) -> Result<Self> {
        config.validate()?;
        let volatility = VolatilityEstimator::from_config(&config)?;
        Ok(Self { config, volatility })
    }

    pub fn config(&self) -> &VolatilityConfig {
        &self.config
    }

    pub fn window_points(&self) -> usize {
        self.volatility.window_points()
    }

    /// Feature column names in the order `build` emits them.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2 * self.config.n_lags + self.config.technical_indicators.len() + 1);
        for lag in 1..=self.config.n_lags {
            names.push(log_return_lag_name(lag));
            names.push(volume_lag_name(lag));
        }
        names.extend(self.config.technical_indicators.iter().map(|indicator| indicator.name()));
        names.push(CURRENT_VOLATILITY.to_string());
        names
    }

    pub fn build(&self, bars: &[Bar], mode: BuildMode) -> Result<FeatureSet> {
        self.check_bars(bars)?;

        let filled = self.fill(raw_frame(bars)?)?;
        for name in [CLOSE, VOLUME] {
            if filled.column(name)?.null_count() > 0 {
                return Err(FeatureError::InsufficientData(format!("column {} has no observations", name)));
            }
        }

        let ratio = col(CLOSE) / col(CLOSE).shift(lit(1i64));
        let mut lagged = Vec::with_capacity(2 * self.config.n_lags);
        for lag in 1..=self.config.n_lags {
            let periods = lit(lag as i64);
            lagged.push(col(LOG_RETURN).shift(periods.clone()).alias(&log_return_lag_name(lag)));
            lagged.push(col(VOLUME).shift(periods).alias(&volume_lag_name(lag)));
        }
        let indicators: Vec<Expr> = self
            .config
            .technical_indicators
            .iter()
            .map(|indicator| indicator_expr(indicator).alias(&indicator.name()))
            .collect();

        let mut frame = filled
            .lazy()
            .with_columns([when(ratio.clone().gt(lit(0.0)).and(ratio.clone().lt(lit(f64::INFINITY))))
                .then(ratio.log(std::f64::consts::E))
                .otherwise(lit(NULL))
                .alias(LOG_RETURN)])
            .with_columns(lagged)
            .with_columns(indicators)
            .collect()?;

        let returns: Vec<Option<f64>> = frame.column(LOG_RETURN)?.f64()?.into_iter().collect();
        let current_volatility = self.volatility.compute_returns(&returns);
        frame.with_column(Series::new(CURRENT_VOLATILITY.into(), current_volatility))?;

        if mode == BuildMode::Train {
            // target_shift counts raw bars, not volatility windows
            let periods = -(self.config.target_shift as i64);
            frame = frame
                .lazy()
                .with_column(col(CURRENT_VOLATILITY).shift(lit(periods)).alias(TARGET_VOLATILITY))
                .collect()?;
        }

        debug!(
            "Built {:?} feature frame: {} rows x {} columns",
            mode,
            frame.height(),
            frame.width()
        );

        Ok(FeatureSet {
            frame,
            feature_names: self.feature_names(),
        })
    }

    fn fill(&self, frame: DataFrame) -> Result<DataFrame> {
        let columns = [OPEN, HIGH, LOW, CLOSE, VOLUME];
        let filled: Vec<Expr> = columns
            .iter()
            .map(|name| match self.config.fillna_method {
                FillMethod::Forward => col(name).forward_fill(None).backward_fill(None),
                FillMethod::Backward => col(name).backward_fill(None).forward_fill(None),
            })
            .collect();
        Ok(frame.lazy().with_columns(filled).collect()?)
    }

    fn check_bars(&self, bars: &[Bar]) -> Result<()> {
        let window_points = self.window_points();
        if bars.len() < window_points {
            return Err(FeatureError::InsufficientData(format!(
                "{} bars do not fill one volatility window of {} bars",
                bars.len(),
                window_points
            )));
        }
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].timestamp >= pair[1].timestamp) {
            return Err(FeatureError::InvalidInput(format!(
                "bar timestamps must be strictly increasing, {} follows {}",
                pair[1].timestamp, pair[0].timestamp
            )));
        }
        Ok(())
    }
}

/// Raw bars as a frame; `NaN` fields become nulls.
fn raw_frame(bars: &[Bar]) -> Result<DataFrame> {
    let column = |name: &str, field: fn(&Bar) -> f64| {
        let values: Vec<Option<f64>> = bars
            .iter()
            .map(|bar| Some(field(bar)).filter(|v| !v.is_nan()))
            .collect();
        Series::new(name.into(), values)
    };
    let timestamps: Vec<i64> = bars.iter().map(|bar| bar.timestamp.timestamp_millis()).collect();

    Ok(DataFrame::new(vec![
        Series::new(TIMESTAMP.into(), timestamps),
        column(OPEN, |bar| bar.open),
        column(HIGH, |bar| bar.high),
        column(LOW, |bar| bar.low),
        column(CLOSE, |bar| bar.close),
        column(VOLUME, |bar| bar.volume),
    ])?)
}

fn indicator_expr(indicator: &TechnicalIndicator) -> Expr {
    match *indicator {
        TechnicalIndicator::Sma(window) => col(CLOSE).rolling_mean(RollingOptions {
            window_size: Duration::parse(&format!("{}i", window)),
            min_periods: window,
            ..Default::default()
        }),
        TechnicalIndicator::Ema(span) => col(CLOSE).ewm_mean(EWMOptions {
            alpha: 2.0 / (span as f64 + 1.0),
            adjust: false,
            min_periods: 1,
            ..Default::default()
        }),
    }
}
