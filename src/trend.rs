/*!
 * Trend classification over time-bucketed series
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::comparison::{percentage_delta, Delta};
use crate::constants::{TREND_DOWN_FACTOR, TREND_UP_FACTOR};

/// Direction of a series over its period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Compare the mean of the second half of a series to the first half
///
/// Halves split by index; with an odd length the first half is the shorter
/// one. Series shorter than two points are stable.
pub fn classify_trend(series: &[f64]) -> Trend {
    if series.len() < 2 {
        return Trend::Stable;
    }

    let (first, second) = series.split_at(series.len() / 2);
    let (first_mean, second_mean) = (mean(first), mean(second));

    if second_mean > first_mean * TREND_UP_FACTOR {
        Trend::Increasing
    } else if second_mean < first_mean * TREND_DOWN_FACTOR {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

/// Trend of a keyed series in key order
pub fn classify_keyed<K: Ord>(series: &BTreeMap<K, f64>) -> Trend {
    let values: Vec<f64> = series.values().copied().collect();
    classify_trend(&values)
}

/// Change of a value against the previous period
pub fn period_over_period(current: f64, previous: f64) -> Delta {
    percentage_delta(current, previous)
}
