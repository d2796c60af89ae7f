use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AlignedSeries, EPSILON};

/// One point of the tracked mean-reverting signal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadPoint {
    pub time: DateTime<Utc>,
    pub spread: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingCorrelationPoint {
    pub index: usize,
    pub correlation: f64,
}

/// Relative-value signal for one aligned pair window. Produced fresh per
/// invocation, never mutated after construction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub hedge_ratio: f64,
    pub hedge_r2: f64,
    pub correlation: f64,
    pub spread: Vec<SpreadPoint>,
    // The upstream consumer expects a per-index series here even though the
    // value is the single global correlation repeated (see DESIGN.md).
    pub rolling_correlation: Vec<RollingCorrelationPoint>,
}

impl AnalyticsResult {
    /// Most recent z-score, if any points exist.
    pub fn latest_z_score(&self) -> Option<f64> {
        self.spread.last().map(|p| p.z_score)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OlsFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares of `y` on `x` via the closed-form normal equations.
///
/// The denominator is floored at [`EPSILON`] so a constant `x` yields a zero
/// slope instead of a division fault.
pub fn hedge_ratio(x: &[f64], y: &[f64]) -> OlsFit {
    let n = x.len();
    if n == 0 {
        return OlsFit {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
        };
    }
    let nf = n as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|v| v * v).sum();

    let denom = (nf * sum_x2 - sum_x * sum_x).max(EPSILON);
    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / nf;

    let predicted: Vec<f64> = x.iter().map(|xi| slope * xi + intercept).collect();
    OlsFit {
        slope,
        intercept,
        r_squared: r_squared(y, &predicted),
    }
}

/// `1 - rss/tss`, defined as 0 for a constant actual series (`tss == 0`).
pub(crate) fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len();
    if n == 0 {
        return 0.0;
    }
    let mean: f64 = actual.iter().sum::<f64>() / n as f64;
    let total_ss: f64 = actual.iter().map(|v| (v - mean) * (v - mean)).sum();
    if total_ss == 0.0 {
        return 0.0;
    }
    let residual_ss: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p) * (a - p))
        .sum();
    1.0 - residual_ss / total_ss
}

/// Pearson correlation over the full vectors, epsilon-guarded.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|v| v * v).sum();
    let sum_y2: f64 = y.iter().map(|v| v * v).sum();

    let denom = ((nf * sum_x2 - sum_x * sum_x) * (nf * sum_y2 - sum_y * sum_y))
        .sqrt()
        .max(EPSILON);
    (nf * sum_xy - sum_x * sum_y) / denom
}

/// Trailing mean over `min(window, i+1)` values ending at each index.
fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Trailing population standard deviation (divisor = slice length).
fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let variance =
                slice.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / slice.len() as f64;
            variance.sqrt()
        })
        .collect()
}

/// Compute the full relative-value signal for an aligned pair.
///
/// Spread is `y - slope*x` (intercept excluded; it only feeds the R²
/// diagnostic). Z-scores use a divisor of 1.0 wherever the rolling std is
/// exactly zero, so a flat window reads as 0 rather than NaN.
pub fn compute_analytics(aligned: &AlignedSeries, window: usize) -> AnalyticsResult {
    if aligned.is_empty() {
        return AnalyticsResult {
            hedge_ratio: 0.0,
            hedge_r2: 0.0,
            correlation: 0.0,
            spread: Vec::new(),
            rolling_correlation: Vec::new(),
        };
    }

    let x_prices = aligned.x_closes();
    let y_prices = aligned.y_closes();

    let fit = hedge_ratio(&x_prices, &y_prices);
    let spread: Vec<f64> = y_prices
        .iter()
        .zip(&x_prices)
        .map(|(y, x)| y - fit.slope * x)
        .collect();

    let means = rolling_mean(&spread, window);
    let stds = rolling_std(&spread, window);
    let correlation = pearson_correlation(&x_prices, &y_prices);

    let times = aligned.times();
    let spread_points = spread
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let divisor = if stds[i] == 0.0 { 1.0 } else { stds[i] };
            SpreadPoint {
                time: times[i],
                spread: s,
                z_score: (s - means[i]) / divisor,
            }
        })
        .collect();

    let rolling_correlation = (0..aligned.len())
        .map(|index| RollingCorrelationPoint { index, correlation })
        .collect();

    AnalyticsResult {
        hedge_ratio: fit.slope,
        hedge_r2: fit.r_squared,
        correlation,
        spread: spread_points,
        rolling_correlation,
    }
}
