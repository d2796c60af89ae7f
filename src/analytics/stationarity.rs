use serde::Serialize;

use super::engine::r_squared;
use super::EPSILON;

/// Approximate critical values at the 10%, 5% and 1% levels.
pub const ADF_CRITICAL_VALUES: [f64; 3] = [-2.57, -2.86, -3.43];

/// Minimum observations before the test produces a statistic.
pub const ADF_MIN_OBSERVATIONS: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdfReport {
    pub test_statistic: Option<f64>,
    pub is_stationary: bool,
    pub critical_values: [f64; 3],
}

/// Simplified Dickey-Fuller proxy: regress the first difference of the
/// series on its own lagged level, single lag, no drift/trend augmentation.
///
/// Fewer than [`ADF_MIN_OBSERVATIONS`] points is a defined negative outcome
/// (`{None, false}`), not an error. Stationary when the statistic falls
/// below the 5% critical value.
pub fn adf_test(series: &[f64]) -> AdfReport {
    let n = series.len();
    if n < ADF_MIN_OBSERVATIONS {
        return AdfReport {
            test_statistic: None,
            is_stationary: false,
            critical_values: ADF_CRITICAL_VALUES,
        };
    }

    // Lagged levels and first differences. The regression sums intentionally
    // use the full series length `n`, matching the documented approximation.
    let x = &series[..n - 1];
    let dy: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let nf = n as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = dy.iter().sum();
    let sum_xy: f64 = x.iter().zip(&dy).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|v| v * v).sum();

    let denom = (nf * sum_x2 - sum_x * sum_x).max(EPSILON);
    let beta = (nf * sum_xy - sum_x * sum_y) / denom;
    let alpha = (sum_y - beta * sum_x) / nf;

    let predicted: Vec<f64> = x.iter().map(|xi| alpha + beta * xi).collect();
    let unexplained = (1.0 - r_squared(&dy, &predicted)) / (nf - 2.0);
    let std_err = unexplained.max(EPSILON).sqrt();
    let test_statistic = beta / std_err;

    AdfReport {
        test_statistic: Some(test_statistic),
        is_stationary: test_statistic < ADF_CRITICAL_VALUES[1],
        critical_values: ADF_CRITICAL_VALUES,
    }
}
