use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FeatureError;

/// A positive bar-clock duration written as `<count><unit>`, e.g. `1min`, `5min`, `4h`, `1D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval(TimeDelta);

impl Interval {
    /// Intervals resolve to whole milliseconds; anything below one is rejected.
    pub fn from_delta(delta: TimeDelta) -> Result<Self, FeatureError> {
        if delta.num_milliseconds() < 1 {
            return Err(FeatureError::InvalidConfiguration(format!(
                "interval must be at least 1 ms, got {:?}",
                delta
            )));
        }
        Ok(Self(delta))
    }

    pub(crate) fn minutes(count: u32) -> Self {
        Self(TimeDelta::minutes(i64::from(count.max(1))))
    }

    pub fn delta(&self) -> TimeDelta {
        self.0
    }

    pub fn num_milliseconds(&self) -> i64 {
        self.0.num_milliseconds()
    }

    /// Number of whole `unit` intervals that fit in `self`, floored.
    pub fn whole_multiples_of(&self, unit: &Interval) -> usize {
        let unit_ms = unit.num_milliseconds().max(1);
        (self.num_milliseconds() / unit_ms) as usize
    }
}

impl FromStr for Interval {
    type Err = FeatureError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
        let (digits, unit) = raw.split_at(split);
        let invalid = || FeatureError::InvalidConfiguration(format!("cannot parse interval {:?}", raw));

        // pandas reads a bare unit ("min") as one of it
        let count: i64 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| invalid())?
        };

        let delta = match unit.trim() {
            "T" => TimeDelta::try_minutes(count),
            "D" => TimeDelta::try_days(count),
            unit => match unit.to_ascii_lowercase().as_str() {
                "ms" => TimeDelta::try_milliseconds(count),
                "s" | "sec" | "second" | "seconds" => TimeDelta::try_seconds(count),
                "m" | "min" | "minute" | "minutes" => TimeDelta::try_minutes(count),
                "h" | "hour" | "hours" => TimeDelta::try_hours(count),
                "d" | "day" | "days" => TimeDelta::try_days(count),
                "w" | "week" | "weeks" => TimeDelta::try_weeks(count),
                _ => None,
            },
        }
        .ok_or_else(invalid)?;

        Interval::from_delta(delta)
    }
}

impl TryFrom<String> for Interval {
    type Error = FeatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(i64, &str); 5] = [
            (86_400_000, "D"),
            (3_600_000, "h"),
            (60_000, "min"),
            (1_000, "s"),
            (1, "ms"),
        ];
        let ms = self.num_milliseconds();
        let (size, name) = UNITS
            .iter()
            .find(|(size, _)| ms % size == 0)
            .copied()
            .unwrap_or((1, "ms"));
        write!(f, "{}{}", ms / size, name)
    }
}
