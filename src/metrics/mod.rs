//! Performance metrics over an equity curve.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::backtest::EquityPoint;

/// Sharpe ratio and mean return (in percent) of an equity curve.
///
/// Period-over-period percentage returns are computed from consecutive
/// curve values; a return whose base is zero is undefined and skipped.
/// The scaling factor is the **count of return observations** (the
/// "actual trading days" convention):
/// `ratio = (mean × n − risk_free_rate) / (std × sqrt(n))`.
/// Callers annualizing against a fixed calendar (e.g. 252) must rescale
/// explicitly.
///
/// Returns `(NaN, NaN)` when fewer than 2 usable returns remain or the
/// return variance is zero, never a divide-by-zero.
pub fn sharpe_ratio(equity: &[EquityPoint], risk_free_rate: f64) -> (f64, f64) {
    let returns = period_returns(equity);
    if returns.len() < 2 {
        return (f64::NAN, f64::NAN);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return (f64::NAN, f64::NAN);
    }

    let mean_scaled = mean * n;
    let ratio = (mean_scaled - risk_free_rate) / (std_dev * n.sqrt());
    (ratio, mean_scaled * 100.0)
}

/// Maximum drawdown: the minimum of `value − running max` over the curve.
/// Zero for a monotonically non-decreasing curve.
pub fn max_drawdown(equity: &[EquityPoint]) -> Decimal {
    let mut running_max: Option<Decimal> = None;
    let mut worst = Decimal::ZERO;

    for point in equity {
        let peak = match running_max {
            Some(peak) => peak.max(point.equity),
            None => point.equity,
        };
        running_max = Some(peak);
        worst = worst.min(point.equity - peak);
    }

    worst
}

fn period_returns(equity: &[EquityPoint]) -> Vec<f64> {
    equity
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].equity.to_f64()?;
            let curr = pair[1].equity.to_f64()?;
            if prev == 0.0 {
                // Undefined return from a zero base; skipped, not coerced.
                return None;
            }
            let r = (curr - prev) / prev;
            r.is_finite().then_some(r)
        })
        .collect()
}
