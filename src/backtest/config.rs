//! Backtest configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for [`crate::backtest::simulate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Z-score magnitude that opens a position (must be positive).
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,

    /// Z-score magnitude that closes a position. Must be strictly below
    /// `entry_threshold` so a neutral band separates exit from re-entry.
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: f64,

    /// Starting cash balance.
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,

    /// Transaction cost as a fraction of position size, charged once at
    /// entry and once at exit.
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost: Decimal,

    /// Hard cap on position size.
    #[serde(default = "default_position_cap")]
    pub position_cap: Decimal,

    /// Fraction of current cash committed per entry.
    #[serde(default = "default_sizing_fraction")]
    pub sizing_fraction: Decimal,

    /// Optional ATR stop-loss; `None` disables forced closes.
    #[serde(default)]
    pub stop_loss: Option<StopLossConfig>,
}

/// ATR-derived stop-loss parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopLossConfig {
    /// Rolling window for the average true range, in bars.
    #[serde(default = "default_atr_window")]
    pub atr_window: usize,

    /// Stop distance in ATR multiples from the entry price.
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: f64,
}

fn default_entry_threshold() -> f64 {
    1.0
}
fn default_exit_threshold() -> f64 {
    0.2
}
fn default_initial_cash() -> Decimal {
    dec!(100_000)
}
fn default_transaction_cost() -> Decimal {
    dec!(0.005)
}
fn default_position_cap() -> Decimal {
    dec!(10_000)
}
fn default_sizing_fraction() -> Decimal {
    dec!(0.1)
}
fn default_atr_window() -> usize {
    14
}
fn default_atr_multiplier() -> f64 {
    3.0
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            entry_threshold: default_entry_threshold(),
            exit_threshold: default_exit_threshold(),
            initial_cash: default_initial_cash(),
            transaction_cost: default_transaction_cost(),
            position_cap: default_position_cap(),
            sizing_fraction: default_sizing_fraction(),
            stop_loss: None,
        }
    }
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            atr_window: default_atr_window(),
            atr_multiplier: default_atr_multiplier(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.entry_threshold > 0.0) {
            return Err(format!(
                "entry_threshold must be positive, got {}",
                self.entry_threshold
            ));
        }
        if !(self.exit_threshold >= 0.0) {
            return Err(format!(
                "exit_threshold cannot be negative, got {}",
                self.exit_threshold
            ));
        }
        if self.exit_threshold >= self.entry_threshold {
            return Err(format!(
                "exit_threshold {} must be strictly below entry_threshold {}",
                self.exit_threshold, self.entry_threshold
            ));
        }
        if self.initial_cash <= Decimal::ZERO {
            return Err("initial_cash must be positive".to_string());
        }
        if self.transaction_cost < Decimal::ZERO {
            return Err("transaction_cost cannot be negative".to_string());
        }
        if self.position_cap <= Decimal::ZERO {
            return Err("position_cap must be positive".to_string());
        }
        if self.sizing_fraction <= Decimal::ZERO || self.sizing_fraction > Decimal::ONE {
            return Err(format!(
                "sizing_fraction must be in (0, 1], got {}",
                self.sizing_fraction
            ));
        }
        if let Some(stop) = &self.stop_loss {
            if stop.atr_window < 2 {
                return Err(format!(
                    "atr_window must be at least 2, got {}",
                    stop.atr_window
                ));
            }
            if !(stop.atr_multiplier > 0.0) {
                return Err(format!(
                    "atr_multiplier must be positive, got {}",
                    stop.atr_multiplier
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(BacktestConfig::default().validate().is_ok());
    }

    #[test]
    fn test_exit_must_be_below_entry() {
        let config = BacktestConfig {
            entry_threshold: 1.0,
            exit_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_entry_threshold_rejected() {
        let config = BacktestConfig {
            entry_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stop_loss_window_validated() {
        let config = BacktestConfig {
            stop_loss: Some(StopLossConfig {
                atr_window: 1,
                atr_multiplier: 3.0,
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
