//! Confidence trend: slope of a simple moving average.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceTrend {
    /// Raw confidence values considered, oldest first.
    pub samples: usize,
    pub moving_average: Vec<f64>,
    /// Least-squares slope of the moving average per step.
    pub slope: f64,
    pub direction: TrendDirection,
}

/// Smooth `values` with an SMA of `window`, fit a line, and classify its
/// slope with a `dead_band` either side of zero. Fewer than two SMA points
/// is stable.
pub fn compute_trend(values: &[f64], window: usize, dead_band: f64) -> ConfidenceTrend {
    let window = window.max(1);
    let moving_average: Vec<f64> = if values.len() < window {
        Vec::new()
    } else {
        values
            .windows(window)
            .map(|w| w.iter().sum::<f64>() / window as f64)
            .collect()
    };
    let slope = least_squares_slope(&moving_average);
    let direction = if slope > dead_band {
        TrendDirection::Improving
    } else if slope < -dead_band {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    };
    ConfidenceTrend {
        samples: values.len(),
        moving_average,
        slope,
        direction,
    }
}

fn least_squares_slope(points: &[f64]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let mean_x = (n - 1) as f64 / 2.0;
    let mean_y = points.iter().sum::<f64>() / n as f64;
    let (num, den) = points
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
