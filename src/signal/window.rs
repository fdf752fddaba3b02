//! Windowed mean/standard-deviation trackers.
//!
//! One explicit abstraction for the crate's local statistics: a trailing
//! simple window and a recursive exponentially-weighted window. Both emit
//! `None` until `min_periods` observations have accumulated; a zero
//! standard deviation is reported as-is and mapped to an undefined z-score
//! by the caller, never coerced.

use std::collections::VecDeque;

/// Local mean and standard deviation at one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Trailing simple moving window with sample standard deviation
/// (n − 1 denominator).
#[derive(Debug)]
pub struct RollingStats {
    window: usize,
    min_periods: usize,
    buffer: VecDeque<f64>,
}

impl RollingStats {
    pub fn new(window: usize, min_periods: usize) -> Self {
        Self {
            window,
            min_periods: min_periods.max(2),
            buffer: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, value: f64) -> Option<WindowStats> {
        self.buffer.push_back(value);
        if self.buffer.len() > self.window {
            self.buffer.pop_front();
        }

        let n = self.buffer.len();
        if n < self.min_periods {
            return None;
        }

        let mean = self.buffer.iter().sum::<f64>() / n as f64;
        let sum_sq: f64 = self.buffer.iter().map(|v| (v - mean).powi(2)).sum();
        let std_dev = (sum_sq / (n - 1) as f64).sqrt();

        Some(WindowStats { mean, std_dev })
    }
}

/// Recursive exponentially-weighted mean/standard-deviation with
/// `alpha = 2 / (span + 1)`.
#[derive(Debug)]
pub struct EwStats {
    alpha: f64,
    min_periods: usize,
    count: usize,
    mean: f64,
    variance: f64,
}

impl EwStats {
    pub fn new(span: usize, min_periods: usize) -> Self {
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            min_periods: min_periods.max(2),
            count: 0,
            mean: 0.0,
            variance: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) -> Option<WindowStats> {
        if self.count == 0 {
            self.mean = value;
            self.variance = 0.0;
        } else {
            let delta = value - self.mean;
            // West's incremental update keeps the variance non-negative.
            self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * delta * delta);
            self.mean += self.alpha * delta;
        }
        self.count += 1;

        (self.count >= self.min_periods).then_some(WindowStats {
            mean: self.mean,
            std_dev: self.variance.max(0.0).sqrt(),
        })
    }
}
