//! Configuration for pair screening.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::screening::screen`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Minimum |Pearson correlation| for the pre-filter (0.0–1.0).
    #[serde(default = "default_correlation_threshold")]
    pub correlation_threshold: f64,

    /// Significance level for the cointegration and ADF tests.
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,

    /// Minimum aligned observations before a pair is tested.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Run the cheap correlation pre-filter before the cointegration test.
    #[serde(default = "default_prefilter")]
    pub prefilter: bool,

    /// Largest lag for the Hurst-exponent validation of the selected spread.
    #[serde(default = "default_hurst_max_lag")]
    pub hurst_max_lag: usize,

    /// Cap on the ranked candidate list; `None` keeps every tested pair.
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

fn default_correlation_threshold() -> f64 {
    0.8
}
fn default_significance_level() -> f64 {
    0.05
}
fn default_min_samples() -> usize {
    30
}
fn default_prefilter() -> bool {
    true
}
fn default_hurst_max_lag() -> usize {
    100
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            correlation_threshold: default_correlation_threshold(),
            significance_level: default_significance_level(),
            min_samples: default_min_samples(),
            prefilter: default_prefilter(),
            hurst_max_lag: default_hurst_max_lag(),
            max_candidates: None,
        }
    }
}

impl ScreeningConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(format!(
                "correlation_threshold must be between 0.0 and 1.0, got {}",
                self.correlation_threshold
            ));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            ));
        }
        if self.min_samples < 3 {
            return Err(format!(
                "min_samples must be at least 3, got {}",
                self.min_samples
            ));
        }
        if self.hurst_max_lag < 3 {
            return Err(format!(
                "hurst_max_lag must be at least 3, got {}",
                self.hurst_max_lag
            ));
        }
        if self.max_candidates == Some(0) {
            return Err("max_candidates cannot be 0".to_string());
        }
        Ok(())
    }
}
