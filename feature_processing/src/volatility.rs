use crate::config::VolatilityConfig;
use crate::error::{FeatureError, Result};

/// Realized volatility over consecutive, non-overlapping blocks of bars.
///
/// Every complete block of `window_points` bars is assigned the sample standard
/// deviation of the log-returns inside it, so the output is a step function. A
/// trailing partial block stays `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolatilityEstimator {
    window_points: usize,
}

impl VolatilityEstimator {
    pub fn new(window_points: usize) -> Result<Self> {
        if window_points == 0 {
            return Err(FeatureError::InvalidConfiguration(
                "volatility window must span at least one bar".to_string(),
            ));
        }
        Ok(Self { window_points })
    }

    pub fn from_config(config: &VolatilityConfig) -> Result<Self> {
        Self::new(config.window_points()?)
    }

    pub fn window_points(&self) -> usize {
        self.window_points
    }

    /// Output has the same length as `prices`.
    pub fn compute(&self, prices: &[f64]) -> Vec<Option<f64>> {
        let prices: Vec<Option<f64>> = prices.iter().map(|p| Some(*p)).collect();
        self.compute_returns(&log_returns(&prices))
    }

    /// Same as [`compute`](Self::compute) for already computed log-returns.
    pub fn compute_returns(&self, returns: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut volatility = vec![None; returns.len()];
        for (block, out) in returns
            .chunks_exact(self.window_points)
            .zip(volatility.chunks_exact_mut(self.window_points))
        {
            out.fill(sample_std(block));
        }
        volatility
    }
}

/// `ln(p[i] / p[i-1])`; `None` at the first position and wherever the ratio is undefined.
pub fn log_returns(prices: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut returns = Vec::with_capacity(prices.len());
    returns.extend(prices.first().map(|_| None));
    returns.extend(prices.windows(2).map(|pair| match (pair[0], pair[1]) {
        (Some(prev), Some(curr)) => Some((curr / prev).ln()).filter(|r| r.is_finite()),
        _ => None,
    }));
    returns
}

/// Standard deviation with one degree of freedom, skipping missing values.
/// Needs at least two observations.
pub fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.len() < 2 {
        return None;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let sum_sq: f64 = observed.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (n - 1.0)).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("value should be present");
        assert!((actual - expected).abs() < 1e-12, "{} != {}", actual, expected);
    }

    #[test]
    fn zero_window_is_invalid() {
        assert!(matches!(
            VolatilityEstimator::new(0),
            Err(FeatureError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn output_is_piecewise_constant_with_missing_tail() {
        let prices = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 100.0, 98.0, 99.0, 97.0, 96.0];
        let estimator = VolatilityEstimator::new(3).unwrap();
        let vol = estimator.compute(&prices);

        assert_eq!(vol.len(), prices.len());
        for block in vol[..9].chunks(3) {
            assert!(block[0].is_some());
            assert!(block.iter().all(|v| *v == block[0]));
        }
        assert!(vol[9..].iter().all(Option::is_none));
    }

    #[test]
    fn first_block_skips_the_undefined_return() {
        let prices = [100.0, 110.0, 99.0, 120.0];
        let vol = VolatilityEstimator::new(4).unwrap().compute(&prices);

        let r: Vec<f64> = prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
        let mean = r.iter().sum::<f64>() / 3.0;
        let expected = (r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0).sqrt();
        for v in vol {
            assert_close(v, expected);
        }
    }

    #[test]
    fn series_shorter_than_window_is_all_missing() {
        let vol = VolatilityEstimator::new(5).unwrap().compute(&[1.0, 2.0, 3.0]);
        assert_eq!(vol, vec![None, None, None]);
    }

    #[test]
    fn constant_prices_have_zero_volatility() {
        let vol = VolatilityEstimator::new(5).unwrap().compute(&[42.0; 20]);
        assert!(vol.iter().all(|v| *v == Some(0.0)));
    }

    #[test]
    fn single_bar_windows_are_undefined() {
        let vol = VolatilityEstimator::new(1).unwrap().compute(&[1.0, 2.0, 4.0]);
        assert!(vol.iter().all(Option::is_none));
    }

    #[test]
    fn log_returns_lead_with_missing() {
        let r = log_returns(&[Some(1.0), Some(std::f64::consts::E), None, Some(2.0)]);
        assert_eq!(r[0], None);
        assert_close(r[1], 1.0);
        assert_eq!(r[2], None);
        assert_eq!(r[3], None);
        assert!(log_returns(&[]).is_empty());
    }
}
