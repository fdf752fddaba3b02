//! Augmented Dickey-Fuller stationarity test.
//!
//! Regresses the first difference on the lagged level with a constant term
//! and maps the t-statistic of the lag coefficient to an approximate
//! p-value by piecewise-linear interpolation of the MacKinnon quantiles
//! (constant-only case). The p-value interface is the contract the
//! screener relies on; a more negative statistic means more stationary.

use super::ols_fit;

/// Minimum samples for a usable test, below which the result is NaN.
const MIN_SAMPLES: usize = 20;

/// MacKinnon quantiles for the Dickey-Fuller distribution, constant-only
/// regression: (t-statistic, cumulative probability).
const DF_CONSTANT_QUANTILES: &[(f64, f64)] = &[
    (-4.00, 0.001),
    (-3.43, 0.01),
    (-3.12, 0.025),
    (-2.86, 0.05),
    (-2.57, 0.10),
    (-1.57, 0.50),
    (-0.44, 0.90),
    (-0.07, 0.95),
    (0.23, 0.975),
    (0.60, 0.99),
    (1.60, 0.999),
];

/// Outcome of a stationarity test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// Dickey-Fuller t-statistic. More negative = more stationary.
    pub statistic: f64,
    /// Approximate p-value in [0, 1]; NaN when the test cannot run.
    pub p_value: f64,
}

impl AdfResult {
    fn undefined() -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
        }
    }
}

/// Piecewise-linear interpolation of a quantile table, clamped at the
/// table's edges.
pub(crate) fn interpolate_p_value(statistic: f64, table: &[(f64, f64)]) -> f64 {
    if !statistic.is_finite() {
        return f64::NAN;
    }

    let (first_stat, first_p) = table[0];
    if statistic <= first_stat {
        return first_p;
    }
    let (last_stat, last_p) = table[table.len() - 1];
    if statistic >= last_stat {
        return last_p;
    }

    for pair in table.windows(2) {
        let (lo_stat, lo_p) = pair[0];
        let (hi_stat, hi_p) = pair[1];
        if statistic <= hi_stat {
            let t = (statistic - lo_stat) / (hi_stat - lo_stat);
            return lo_p + t * (hi_p - lo_p);
        }
    }

    last_p
}

/// t-statistic of the lag coefficient in `Δy[t] = c + γ·y[t−1] + ε`.
///
/// `None` when the series is too short or the regression is degenerate
/// (constant level or zero residual spread).
pub(crate) fn dickey_fuller_statistic(series: &[f64]) -> Option<f64> {
    if series.len() < MIN_SAMPLES {
        return None;
    }

    let n = series.len() - 1;
    let mut delta = Vec::with_capacity(n);
    let mut lagged = Vec::with_capacity(n);
    for pair in series.windows(2) {
        delta.push(pair[1] - pair[0]);
        lagged.push(pair[0]);
    }

    let fit = ols_fit(&delta, &lagged)?;

    let mut sse = 0.0;
    let mut ssx = 0.0;
    let lag_mean = lagged.iter().sum::<f64>() / n as f64;
    for (d, l) in delta.iter().zip(lagged.iter()) {
        let residual = d - (fit.slope * l + fit.intercept);
        sse += residual * residual;
        let dx = l - lag_mean;
        ssx += dx * dx;
    }

    if n <= 2 || ssx.abs() < f64::EPSILON {
        return None;
    }

    // Two estimated parameters: slope and intercept.
    let mse = sse / (n as f64 - 2.0);
    let se_gamma = (mse / ssx).sqrt();
    if se_gamma.abs() < f64::EPSILON || !se_gamma.is_finite() {
        return None;
    }

    let t = fit.slope / se_gamma;
    t.is_finite().then_some(t)
}

/// Augmented Dickey-Fuller test with a constant term.
///
/// The result's p-value is NaN when fewer than 20 samples remain or the
/// regression is degenerate (e.g. a constant series).
pub fn adf_test(series: &[f64]) -> AdfResult {
    match dickey_fuller_statistic(series) {
        Some(statistic) => AdfResult {
            statistic,
            p_value: interpolate_p_value(statistic, DF_CONSTANT_QUANTILES),
        },
        None => AdfResult::undefined(),
    }
}
