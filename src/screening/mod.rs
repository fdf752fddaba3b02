//! Pair screening.
//!
//! Enumerates candidate pairs from a set of price series, tests each for
//! correlation, cointegration and spread stationarity, and selects a best
//! pair with an explicit fallback policy.
//!
//! # Example
//!
//! ```ignore
//! use statarb::screening::{screen, ScreeningConfig};
//!
//! let report = screen(&universe, &ScreeningConfig::default())?;
//! if report.fallback {
//!     // nothing met the significance level; selection is best-effort
//! }
//! ```

pub mod config;
pub mod error;
pub mod screener;

pub use config::ScreeningConfig;
pub use error::ScreeningError;
pub use screener::{screen, PairCandidate, ScreeningReport};
