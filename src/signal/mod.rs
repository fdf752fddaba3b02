//! Spread signal generation.
//!
//! Turns a spread series into a z-score stream against a local (rolling or
//! exponentially-weighted) mean, with optional secondary smoothing and
//! adaptive threshold bands. Undefined values (insufficient window
//! history, or a window with exactly zero standard deviation) propagate
//! as NaN and are filtered by the consumer, never coerced to zero.

pub mod window;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::series::SpreadSeries;
use window::{EwStats, RollingStats};

/// Width multiplier for the adaptive threshold bands.
const ADAPTIVE_BAND_WIDTH: f64 = 2.0;

/// Local-statistics flavour for the z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Windowing {
    /// Trailing simple moving window.
    Rolling,
    /// Exponentially-weighted window with span = `window`.
    Exponential,
}

/// Configuration for [`generate_signal`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Windowing mode for the local mean/standard deviation.
    #[serde(default = "default_windowing")]
    pub windowing: Windowing,

    /// Window length (rolling) or span (exponential), in bars.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Samples required before a value is emitted. Defaults to `window`.
    #[serde(default)]
    pub min_periods: Option<usize>,

    /// Optional secondary moving-average pass over the z-score itself.
    #[serde(default)]
    pub smoothing: Option<usize>,
}

fn default_windowing() -> Windowing {
    Windowing::Rolling
}
fn default_window() -> usize {
    30
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            windowing: default_windowing(),
            window: default_window(),
            min_periods: None,
            smoothing: None,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window < 2 {
            return Err(format!("window must be at least 2, got {}", self.window));
        }
        if let Some(mp) = self.min_periods {
            if mp < 2 || mp > self.window {
                return Err(format!(
                    "min_periods must be in 2..={}, got {}",
                    self.window, mp
                ));
            }
        }
        if let Some(s) = self.smoothing {
            if s < 2 {
                return Err(format!("smoothing window must be at least 2, got {s}"));
            }
        }
        Ok(())
    }

    fn effective_min_periods(&self) -> usize {
        self.min_periods.unwrap_or(self.window)
    }
}

/// Z-score stream over (a subset of) a spread's index. NaN = undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScoreSignal {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl ZScoreSignal {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Count of defined (non-NaN) values.
    pub fn defined_len(&self) -> usize {
        self.values.iter().filter(|v| v.is_finite()).count()
    }
}

/// Derive the z-score signal for a spread.
///
/// With smoothing configured, NaN gaps are first bridged by linear
/// interpolation (trailing gaps hold the last defined value, leading gaps
/// stay undefined), the moving average is applied, and still-undefined
/// leading values are dropped from the output, so the result may cover a
/// shorter index than the spread.
pub fn generate_signal(spread: &SpreadSeries, config: &SignalConfig) -> ZScoreSignal {
    let min_periods = config.effective_min_periods();
    let mut values = Vec::with_capacity(spread.len());

    match config.windowing {
        Windowing::Rolling => {
            let mut stats = RollingStats::new(config.window, min_periods);
            for &value in &spread.values {
                values.push(z_from(stats.push(value), value));
            }
        }
        Windowing::Exponential => {
            let mut stats = EwStats::new(config.window, min_periods);
            for &value in &spread.values {
                values.push(z_from(stats.push(value), value));
            }
        }
    }

    let (timestamps, values) = match config.smoothing {
        Some(width) => smooth(&spread.timestamps, values, width),
        None => (spread.timestamps.clone(), values),
    };

    let signal = ZScoreSignal { timestamps, values };
    debug!(
        points = signal.len(),
        defined = signal.defined_len(),
        "Signal generated"
    );
    signal
}

fn z_from(stats: Option<window::WindowStats>, value: f64) -> f64 {
    match stats {
        Some(s) if s.std_dev > 0.0 && value.is_finite() => (value - s.mean) / s.std_dev,
        // Zero dispersion or insufficient history: undefined, not zero.
        _ => f64::NAN,
    }
}

/// Bridge interior NaN gaps linearly. Trailing gaps hold the last defined
/// value; leading gaps stay NaN.
fn interpolate_gaps(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut last_defined: Option<usize> = None;

    for i in 0..out.len() {
        if out[i].is_finite() {
            if let Some(prev) = last_defined {
                let gap = i - prev;
                if gap > 1 {
                    let step = (out[i] - out[prev]) / gap as f64;
                    for k in 1..gap {
                        out[prev + k] = out[prev] + step * k as f64;
                    }
                }
            }
            last_defined = Some(i);
        }
    }

    if let Some(prev) = last_defined {
        for value in out.iter_mut().skip(prev + 1) {
            *value = values[prev];
        }
    }

    out
}

fn smooth(timestamps: &[i64], values: Vec<f64>, width: usize) -> (Vec<i64>, Vec<f64>) {
    let bridged = interpolate_gaps(&values);

    let mut stats = RollingStats::new(width, width);
    let mut smoothed = Vec::with_capacity(bridged.len());
    for &value in &bridged {
        if value.is_finite() {
            smoothed.push(stats.push(value).map_or(f64::NAN, |s| s.mean));
        } else {
            smoothed.push(f64::NAN);
        }
    }

    let first_defined = smoothed
        .iter()
        .position(|v| v.is_finite())
        .unwrap_or(smoothed.len());

    (
        timestamps[first_defined..].to_vec(),
        smoothed[first_defined..].to_vec(),
    )
}

/// Adaptive entry bands: ±2 × rolling standard deviation of the spread.
///
/// Optional overrides for the fixed entry thresholds; recompute when
/// spread volatility is expected to vary materially over the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBands {
    pub timestamps: Vec<i64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn adaptive_thresholds(spread: &SpreadSeries, window: usize) -> ThresholdBands {
    let mut stats = RollingStats::new(window, window);
    let mut upper = Vec::with_capacity(spread.len());
    let mut lower = Vec::with_capacity(spread.len());

    for &value in &spread.values {
        match stats.push(value) {
            Some(s) => {
                upper.push(ADAPTIVE_BAND_WIDTH * s.std_dev);
                lower.push(-ADAPTIVE_BAND_WIDTH * s.std_dev);
            }
            None => {
                upper.push(f64::NAN);
                lower.push(f64::NAN);
            }
        }
    }

    ThresholdBands {
        timestamps: spread.timestamps.clone(),
        upper,
        lower,
    }
}

/// Candidate entry timestamps: z below −entry (long the spread) and z
/// above +entry (short the spread). Candidates only: execution ordering
/// and position state belong to the backtest simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidates {
    pub long: Vec<i64>,
    pub short: Vec<i64>,
}

pub fn entry_candidates(signal: &ZScoreSignal, entry_threshold: f64) -> EntryCandidates {
    let mut long = Vec::new();
    let mut short = Vec::new();

    for (ts, z) in signal.timestamps.iter().zip(signal.values.iter()) {
        if !z.is_finite() {
            continue;
        }
        if *z < -entry_threshold {
            long.push(*ts);
        } else if *z > entry_threshold {
            short.push(*ts);
        }
    }

    EntryCandidates { long, short }
}
