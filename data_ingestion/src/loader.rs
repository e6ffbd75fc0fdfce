use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::{debug, info, warn};
use serde::Deserialize;
use std::path::Path;

use crate::bar::Bar;
use crate::error::DataIngestionError;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(alias = "date", alias = "datetime")]
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

/// Loads bars from a CSV file with a header row, sorted ascending by timestamp.
pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>, DataIngestionError> {
    let path = path.as_ref();
    info!("Loading bars from {}", path.display());
    let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    read_bars(reader)
}

/// Same as [`load_bars`] for any reader, mostly useful for in-memory data.
pub fn read_bars<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Bar>, DataIngestionError> {
    let mut bars = Vec::new();
    for record in reader.deserialize::<CsvRecord>() {
        let record = record?;
        let timestamp = parse_timestamp(&record.timestamp)?;
        bars.push(Bar::new(
            timestamp,
            record.open.unwrap_or(f64::NAN),
            record.high.unwrap_or(f64::NAN),
            record.low.unwrap_or(f64::NAN),
            record.close.unwrap_or(f64::NAN),
            record.volume.unwrap_or(f64::NAN),
        ));
    }

    bars.sort_by_key(|bar| bar.timestamp);
    if let Some(pair) = bars.windows(2).find(|pair| pair[0].timestamp == pair[1].timestamp) {
        return Err(DataIngestionError::DuplicateTimestamp(pair[1].timestamp.to_rfc3339()));
    }

    debug!("Read {} bars", bars.len());
    Ok(bars)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DataIngestionError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    if let Some(ts) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(ts.and_utc());
    }
    Err(DataIngestionError::InvalidTimestamp(raw.to_string()))
}

/// Rejects bars with negative prices or volume. Missing (`NaN`) fields pass.
pub fn validate_bars(bars: &[Bar]) -> Result<(), DataIngestionError> {
    for bar in bars {
        let checks = [
            ("volume", bar.volume),
            ("open", bar.open),
            ("close", bar.close),
            ("high", bar.high),
            ("low", bar.low),
        ];
        if let Some((field, _)) = checks.iter().find(|(_, value)| *value < 0.0) {
            warn!("{} cannot be negative", field);
            return Err(DataIngestionError::InvalidBar {
                timestamp: bar.timestamp.to_rfc3339(),
                reason: format!("negative {}", field),
            });
        }
    }
    Ok(())
}
