use log::debug;
use polars::prelude::*;

use crate::error::{FeatureError, Result};

/// Keeps rows `0, w, 2w, ...`: one representative row per volatility window.
pub fn select_windows(frame: &DataFrame, window_points: usize) -> Result<DataFrame> {
    if window_points == 0 {
        return Err(FeatureError::InvalidConfiguration(
            "sampling stride must be at least one row".to_string(),
        ));
    }
    let mask: Vec<bool> = (0..frame.height()).map(|i| i % window_points == 0).collect();
    let mask = BooleanChunked::from_slice("window_start".into(), &mask);
    Ok(frame.filter(&mask)?)
}

/// Window-strided rows with every `required` column populated.
pub fn sample(frame: &DataFrame, window_points: usize, required: &[String]) -> Result<DataFrame> {
    let strided = select_windows(frame, window_points)?;
    let complete = strided.drop_nulls(Some(required))?;
    debug!(
        "Sampled {} of {} rows, {} complete",
        strided.height(),
        frame.height(),
        complete.height()
    );
    Ok(complete)
}
