//! Error types for pair screening.

use thiserror::Error;

/// Errors that can occur during pair screening.
#[derive(Error, Debug)]
pub enum ScreeningError {
    /// Empty input set, or too few series to form a single pair.
    #[error("need at least 2 input series to form pairs, got {0}")]
    NoCandidates(usize),

    /// Every pair fell below the minimum aligned sample count.
    #[error("no pair has at least {min_samples} aligned observations")]
    InsufficientData { min_samples: usize },

    /// Pairs were tested but none produced a usable cointegration
    /// p-value, so there is nothing to rank and nothing to fall back to.
    #[error("no pair produced a usable cointegration statistic")]
    NoTestablePair,

    /// Invalid configuration.
    #[error("invalid screening configuration: {0}")]
    InvalidConfig(String),
}
