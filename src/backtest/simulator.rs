//! Position state machine over a z-score stream.
//!
//! Walks the signal in timestamp order, opening and closing spread
//! positions against configured thresholds, charging transaction costs,
//! and emitting a trade log plus the cumulative realized PnL curve. The
//! walk is strictly sequential: cash and position state at time t depend
//! on every prior timestamp, and each simulation owns its state
//! exclusively, so independent pairs may run concurrently without sharing.

use std::collections::VecDeque;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::BacktestConfig;
use crate::series::SpreadSeries;
use crate::signal::ZScoreSignal;

/// Floor for the average true range so the stop distance never collapses
/// to zero.
const ATR_EPSILON: f64 = 1e-8;

/// Errors raised before the walk starts. Degenerate *data* never errors;
/// it produces an empty report with a diagnostic.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("invalid backtest configuration: {0}")]
    InvalidConfig(String),

    /// The signal carries a timestamp the spread does not.
    #[error("signal timestamp {0} not present in spread index")]
    IndexMismatch(i64),
}

/// Side of an open spread position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The z-score re-entered the neutral band.
    MeanReversion,
    /// The ATR stop level was breached.
    StopLoss,
}

/// A completed round trip. Immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub direction: Direction,
    /// Spread level at entry.
    pub entry_price: f64,
    /// Spread level at exit.
    pub exit_price: f64,
    pub size: Decimal,
    /// Net of the exit-side transaction cost.
    pub realized_pnl: Decimal,
    pub exit_reason: ExitReason,
}

/// Cumulative realized PnL at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: Decimal,
}

/// Why a simulation returned an empty result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacktestDiagnostic {
    EmptySpread,
    /// The spread never moves; no statistic over it is defined.
    DegenerateSpread,
    AllSignalUndefined,
}

/// Simulation output.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    /// Cumulative realized PnL, one point per defined signal timestamp.
    /// Entry-side costs hit `final_cash`, not this curve.
    pub equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub final_cash: Decimal,
    pub diagnostic: Option<BacktestDiagnostic>,
}

impl BacktestReport {
    fn empty(cash: Decimal, diagnostic: BacktestDiagnostic) -> Self {
        warn!(?diagnostic, "Degenerate backtest input, returning empty result");
        Self {
            equity: Vec::new(),
            trades: Vec::new(),
            final_cash: cash,
            diagnostic: Some(diagnostic),
        }
    }
}

#[derive(Debug)]
struct OpenPosition {
    direction: Direction,
    entry_timestamp: i64,
    entry_price: f64,
    size: Decimal,
}

/// `max(high − low, |high − prev_close|, |low − prev_close|)`.
fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Rolling mean of the true range, floored at [`ATR_EPSILON`].
///
/// The spread is a plain series, so each bar degrades to
/// high = low = close and the true range to |Δspread|.
#[derive(Debug)]
struct AtrTracker {
    window: usize,
    prev_close: Option<f64>,
    ranges: VecDeque<f64>,
}

impl AtrTracker {
    fn new(window: usize) -> Self {
        Self {
            window,
            prev_close: None,
            ranges: VecDeque::with_capacity(window),
        }
    }

    fn update(&mut self, value: f64) {
        let tr = match self.prev_close {
            Some(prev) => true_range(value, value, prev),
            None => 0.0,
        };
        self.prev_close = Some(value);
        self.ranges.push_back(tr);
        if self.ranges.len() > self.window {
            self.ranges.pop_front();
        }
    }

    /// Defined once the window is full.
    fn current(&self) -> Option<f64> {
        (self.ranges.len() >= self.window).then(|| {
            let mean = self.ranges.iter().sum::<f64>() / self.ranges.len() as f64;
            mean.max(ATR_EPSILON)
        })
    }
}

/// Run the position state machine over `signal` against `spread`.
///
/// Signal timestamps must be a subset of the spread's (the generator only
/// ever narrows the index). Undefined signal values are skipped, not
/// treated as zero. The terminal position is left open, no forced close.
pub fn simulate(
    spread: &SpreadSeries,
    signal: &ZScoreSignal,
    config: &BacktestConfig,
) -> Result<BacktestReport, BacktestError> {
    config.validate().map_err(BacktestError::InvalidConfig)?;

    if spread.is_empty() {
        return Ok(BacktestReport::empty(
            config.initial_cash,
            BacktestDiagnostic::EmptySpread,
        ));
    }
    if spread_is_degenerate(&spread.values) {
        return Ok(BacktestReport::empty(
            config.initial_cash,
            BacktestDiagnostic::DegenerateSpread,
        ));
    }
    if signal.defined_len() == 0 {
        return Ok(BacktestReport::empty(
            config.initial_cash,
            BacktestDiagnostic::AllSignalUndefined,
        ));
    }

    let mut cash = config.initial_cash;
    let mut cumulative_pnl = Decimal::ZERO;
    let mut position: Option<OpenPosition> = None;
    let mut equity = Vec::with_capacity(signal.defined_len());
    let mut trades = Vec::new();

    let mut atr = config.stop_loss.map(|stop| AtrTracker::new(stop.atr_window));
    let mut spread_idx = 0usize;

    for (&ts, &z) in signal.timestamps.iter().zip(signal.values.iter()) {
        // Advance the spread cursor, feeding skipped bars to the ATR.
        while spread_idx < spread.len() && spread.timestamps[spread_idx] < ts {
            if let Some(tracker) = atr.as_mut() {
                tracker.update(spread.values[spread_idx]);
            }
            spread_idx += 1;
        }
        if spread_idx >= spread.len() || spread.timestamps[spread_idx] != ts {
            return Err(BacktestError::IndexMismatch(ts));
        }
        let spread_value = spread.values[spread_idx];

        if !z.is_finite() {
            // Undefined signal: no decision, no equity sample.
            if let Some(tracker) = atr.as_mut() {
                tracker.update(spread_value);
            }
            spread_idx += 1;
            continue;
        }

        if !spread_value.is_finite() {
            // Never let a NaN spread reach the cash arithmetic.
            warn!(timestamp = ts, "Non-finite spread value, skipping bar");
            spread_idx += 1;
            continue;
        }

        // Stop level from the ATR as of the previous bar.
        let stop_distance = match (&config.stop_loss, &atr) {
            (Some(stop), Some(tracker)) => tracker.current().map(|a| stop.atr_multiplier * a),
            _ => None,
        };

        match position.take() {
            Some(open) => {
                let stopped = match (open.direction, stop_distance) {
                    (Direction::Long, Some(d)) => spread_value < open.entry_price - d,
                    (Direction::Short, Some(d)) => spread_value > open.entry_price + d,
                    _ => false,
                };

                if stopped {
                    close_position(
                        open,
                        ts,
                        spread_value,
                        ExitReason::StopLoss,
                        config,
                        &mut cash,
                        &mut cumulative_pnl,
                        &mut trades,
                    );
                } else if z.abs() < config.exit_threshold {
                    close_position(
                        open,
                        ts,
                        spread_value,
                        ExitReason::MeanReversion,
                        config,
                        &mut cash,
                        &mut cumulative_pnl,
                        &mut trades,
                    );
                } else {
                    position = Some(open);
                }
            }
            None => {
                let direction = if z < -config.entry_threshold {
                    Some(Direction::Long)
                } else if z > config.entry_threshold {
                    Some(Direction::Short)
                } else {
                    None
                };

                if let Some(direction) = direction {
                    let size = (cash * config.sizing_fraction).min(config.position_cap);
                    if size <= Decimal::ZERO {
                        warn!(timestamp = ts, "Cash depleted, entry skipped");
                    } else {
                        cash -= size * config.transaction_cost;
                        debug!(
                            timestamp = ts,
                            ?direction,
                            %size,
                            spread = spread_value,
                            z,
                            "Opened position"
                        );
                        position = Some(OpenPosition {
                            direction,
                            entry_timestamp: ts,
                            entry_price: spread_value,
                            size,
                        });
                    }
                }
            }
        }

        equity.push(EquityPoint {
            timestamp: ts,
            equity: cumulative_pnl,
        });

        if let Some(tracker) = atr.as_mut() {
            tracker.update(spread_value);
        }
        spread_idx += 1;
    }

    info!(
        trades = trades.len(),
        %cash,
        open_position = position.is_some(),
        "Backtest complete"
    );

    Ok(BacktestReport {
        equity,
        trades,
        final_cash: cash,
        diagnostic: None,
    })
}

fn spread_is_degenerate(values: &[f64]) -> bool {
    let mut finite = values.iter().filter(|v| v.is_finite());
    let Some(first) = finite.next() else {
        return true;
    };
    finite.all(|v| v == first)
}

#[allow(clippy::too_many_arguments)]
fn close_position(
    open: OpenPosition,
    ts: i64,
    spread_value: f64,
    exit_reason: ExitReason,
    config: &BacktestConfig,
    cash: &mut Decimal,
    cumulative_pnl: &mut Decimal,
    trades: &mut Vec<Trade>,
) {
    let delta = match open.direction {
        Direction::Long => spread_value - open.entry_price,
        Direction::Short => open.entry_price - spread_value,
    };
    let Some(delta) = Decimal::from_f64_retain(delta) else {
        warn!(timestamp = ts, "Unrepresentable spread move, close skipped");
        return;
    };

    let realized_pnl = open.size * delta - open.size * config.transaction_cost;
    *cash += realized_pnl;
    *cumulative_pnl += realized_pnl;

    debug!(
        timestamp = ts,
        ?exit_reason,
        pnl = %realized_pnl,
        "Closed position"
    );

    trades.push(Trade {
        entry_timestamp: open.entry_timestamp,
        exit_timestamp: ts,
        direction: open.direction,
        entry_price: open.entry_price,
        exit_price: spread_value,
        size: open.size,
        realized_pnl,
        exit_reason,
    });
}
