//! Pair enumeration, statistical testing and ranking.
//!
//! Every unordered pair from the input set is aligned and tested for
//! correlation, cointegration (on the raw prices) and spread stationarity.
//! Candidate evaluation is a pure computation over immutable series, so
//! pairs fan out across a worker pool; the merge re-imposes enumeration
//! order and a stable sort keyed on (validity, cointegration p-value, pair
//! identity), which makes the ranking deterministic regardless of
//! completion order.

use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::config::ScreeningConfig;
use super::error::ScreeningError;
use crate::series::{align_pair, PriceSeries};
use crate::stats::{
    adf_test, engle_granger, half_life, hedge_ratio, hurst_exponent, pearson_correlation,
};

/// One tested pair. Derived per screening pass, never persisted.
///
/// p-values are NaN when the underlying test could not run (insufficient
/// or degenerate data); NaN candidates rank last and never count as valid.
#[derive(Debug, Clone, PartialEq)]
pub struct PairCandidate {
    pub symbol_a: String,
    pub symbol_b: String,
    /// Pearson correlation of the aligned prices, in [−1, 1] (NaN when
    /// undefined).
    pub correlation: f64,
    /// Engle-Granger p-value on the raw price pair.
    pub coint_p_value: f64,
    /// ADF p-value on the hedge-ratio spread.
    pub adf_p_value: f64,
    /// OLS slope of a on b (see [`hedge_ratio`]).
    pub hedge_ratio: f64,
    /// Mean-reversion half-life of the spread, in bars.
    pub half_life: f64,
}

impl PairCandidate {
    /// Both tests significant at `level`. NaN p-values never qualify.
    pub fn is_valid(&self, level: f64) -> bool {
        self.coint_p_value < level && self.adf_p_value < level
    }
}

/// Ranked screening output plus the selection and its validation.
#[derive(Debug, Clone)]
pub struct ScreeningReport {
    /// Every tested pair, ranked: valid pairs first by ascending
    /// cointegration p-value, then the rest, NaN last; ties broken by
    /// pair identity.
    pub candidates: Vec<PairCandidate>,
    /// The chosen pair: the top-ranked valid candidate, or the fallback.
    pub selected: PairCandidate,
    /// True when no pair met the significance level and the selection
    /// fell back to the globally lowest cointegration p-value.
    pub fallback: bool,
    /// Hurst exponent of the selected pair's spread.
    pub hurst: f64,
    /// True when the spread is not evidently mean-reverting
    /// (exponent ≥ 0.5, or not estimable). A warning, not a failure.
    pub hurst_warning: bool,
}

enum PairOutcome {
    Candidate(PairCandidate),
    TooShort,
    Filtered,
}

/// Screen every unordered pair and select the best one.
///
/// See [`ScreeningReport`] for ranking semantics. The fallback policy is
/// explicit: when nothing passes the significance level the globally
/// lowest cointegration p-value wins and `fallback` is set.
pub fn screen(
    series: &[PriceSeries],
    config: &ScreeningConfig,
) -> Result<ScreeningReport, ScreeningError> {
    config.validate().map_err(ScreeningError::InvalidConfig)?;

    if series.len() < 2 {
        return Err(ScreeningError::NoCandidates(series.len()));
    }

    let mut pairs = Vec::new();
    for i in 0..series.len() {
        for j in (i + 1)..series.len() {
            pairs.push((i, j));
        }
    }

    info!(
        series = series.len(),
        pairs = pairs.len(),
        significance = config.significance_level,
        prefilter = config.prefilter,
        "Screening pair candidates"
    );

    let outcomes: Vec<PairOutcome> = pairs
        .par_iter()
        .map(|&(i, j)| evaluate_pair(&series[i], &series[j], config))
        .collect();

    let mut candidates = Vec::new();
    let mut too_short = 0usize;
    for outcome in outcomes {
        match outcome {
            PairOutcome::Candidate(c) => candidates.push(c),
            PairOutcome::TooShort => too_short += 1,
            PairOutcome::Filtered => {}
        }
    }

    if candidates.is_empty() {
        if too_short == pairs.len() {
            return Err(ScreeningError::InsufficientData {
                min_samples: config.min_samples,
            });
        }
        return Err(ScreeningError::NoTestablePair);
    }

    let level = config.significance_level;
    candidates.sort_by(|x, y| {
        y.is_valid(level)
            .cmp(&x.is_valid(level))
            .then_with(|| compare_p(x.coint_p_value, y.coint_p_value))
            .then_with(|| (&x.symbol_a, &x.symbol_b).cmp(&(&y.symbol_a, &y.symbol_b)))
    });

    let (selected, fallback) = if candidates[0].is_valid(level) {
        (candidates[0].clone(), false)
    } else {
        let best = candidates
            .iter()
            .filter(|c| !c.coint_p_value.is_nan())
            .min_by(|x, y| compare_p(x.coint_p_value, y.coint_p_value))
            .ok_or(ScreeningError::NoTestablePair)?;
        warn!(
            pair = format!("{}-{}", best.symbol_a, best.symbol_b),
            coint_p = best.coint_p_value,
            "No pair satisfies the significance thresholds; falling back to lowest cointegration p-value"
        );
        (best.clone(), true)
    };

    let (hurst, hurst_warning) = validate_selection(series, &selected, config);

    if let Some(cap) = config.max_candidates {
        candidates.truncate(cap);
    }

    info!(
        candidates = candidates.len(),
        selected = format!("{}-{}", selected.symbol_a, selected.symbol_b),
        fallback,
        hurst,
        "Screening complete"
    );

    Ok(ScreeningReport {
        candidates,
        selected,
        fallback,
        hurst,
        hurst_warning,
    })
}

/// Total order on p-values with NaN ranked last.
fn compare_p(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn evaluate_pair(a: &PriceSeries, b: &PriceSeries, config: &ScreeningConfig) -> PairOutcome {
    let Ok(aligned) = align_pair(a, b) else {
        debug!(a = a.symbol(), b = b.symbol(), "No overlap, skipping pair");
        return PairOutcome::TooShort;
    };

    if aligned.len() < config.min_samples {
        debug!(
            a = a.symbol(),
            b = b.symbol(),
            len = aligned.len(),
            min = config.min_samples,
            "Too few aligned observations, skipping pair"
        );
        return PairOutcome::TooShort;
    }

    let correlation = pearson_correlation(aligned.a(), aligned.b()).unwrap_or(f64::NAN);

    if config.prefilter && !(correlation.abs() > config.correlation_threshold) {
        debug!(
            pair = format!("{}-{}", a.symbol(), b.symbol()),
            corr = correlation,
            "Correlation below pre-filter threshold"
        );
        return PairOutcome::Filtered;
    }

    let ratio = hedge_ratio(aligned.a(), aligned.b()).unwrap_or(f64::NAN);
    let (coint_p, adf_p, hl) = if ratio.is_finite() {
        let spread = aligned.spread(ratio);
        (
            engle_granger(aligned.a(), aligned.b()).p_value,
            adf_test(&spread.values).p_value,
            half_life(&spread.values),
        )
    } else {
        (f64::NAN, f64::NAN, f64::NAN)
    };

    let candidate = PairCandidate {
        symbol_a: aligned.symbol_a().to_string(),
        symbol_b: aligned.symbol_b().to_string(),
        correlation,
        coint_p_value: coint_p,
        adf_p_value: adf_p,
        hedge_ratio: ratio,
        half_life: hl,
    };

    if candidate.is_valid(config.significance_level) {
        info!(
            pair = format!("{}-{}", candidate.symbol_a, candidate.symbol_b),
            correlation = format!("{:.3}", correlation),
            coint_p = format!("{:.4}", coint_p),
            adf_p = format!("{:.4}", adf_p),
            hedge = format!("{:.4}", ratio),
            "Viable pair found"
        );
    }

    PairOutcome::Candidate(candidate)
}

/// Hurst validation of the selected pair's spread.
fn validate_selection(
    series: &[PriceSeries],
    selected: &PairCandidate,
    config: &ScreeningConfig,
) -> (f64, bool) {
    let find = |symbol: &str| series.iter().find(|s| s.symbol() == symbol);
    let (Some(a), Some(b)) = (find(&selected.symbol_a), find(&selected.symbol_b)) else {
        return (f64::NAN, true);
    };
    let Ok(aligned) = align_pair(a, b) else {
        return (f64::NAN, true);
    };

    let ratio = if selected.hedge_ratio.is_finite() {
        selected.hedge_ratio
    } else {
        1.0
    };
    let spread = aligned.spread(ratio);
    let hurst = hurst_exponent(&spread.values, config.hurst_max_lag);

    let warning = !(hurst < 0.5);
    if warning {
        warn!(
            pair = format!("{}-{}", selected.symbol_a, selected.symbol_b),
            hurst,
            "Spread may not be mean-reverting"
        );
    }
    (hurst, warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_noise(state: &mut u64) -> f64 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (*state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
    }

    /// Universe: A and B cointegrated (B is half of A's level plus a
    /// fast-reverting offset), C an independent drifting walk.
    fn universe(len: usize) -> Vec<PriceSeries> {
        let mut state = 3u64;
        let mut level = 100.0;
        let mut offset = 0.0;
        let mut other = 40.0;

        let mut a = Vec::with_capacity(len);
        let mut b = Vec::with_capacity(len);
        let mut c = Vec::with_capacity(len);
        for t in 0..len as i64 {
            level += 0.4 + pseudo_noise(&mut state);
            offset = 0.2 * offset + 0.5 * pseudo_noise(&mut state);
            other += 0.9 + 2.0 * pseudo_noise(&mut state);
            a.push((t, level));
            b.push((t, 0.5 * level + offset));
            c.push((t, other));
        }

        vec![
            PriceSeries::new("AAA", a).unwrap(),
            PriceSeries::new("BBB", b).unwrap(),
            PriceSeries::new("CCC", c).unwrap(),
        ]
    }

    fn no_prefilter() -> ScreeningConfig {
        ScreeningConfig {
            prefilter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_selects_cointegrated_pair() {
        let report = screen(&universe(300), &no_prefilter()).unwrap();

        assert!(!report.fallback);
        assert_eq!(report.selected.symbol_a, "AAA");
        assert_eq!(report.selected.symbol_b, "BBB");
        assert!(report.selected.coint_p_value < 0.05);
        assert!(report.selected.adf_p_value < 0.05);
        // B ≈ 0.5 × A, so the slope of A on B is near 2.
        assert!((report.selected.hedge_ratio - 2.0).abs() < 0.2);
    }

    #[test]
    fn test_selected_spread_passes_hurst_check() {
        let report = screen(&universe(300), &no_prefilter()).unwrap();
        assert!(report.hurst < 0.5, "got H = {}", report.hurst);
        assert!(!report.hurst_warning);
    }

    #[test]
    fn test_fallback_when_nothing_significant() {
        // A significance level nothing can meet forces the fallback path.
        let config = ScreeningConfig {
            prefilter: false,
            significance_level: 1e-9,
            ..Default::default()
        };
        let report = screen(&universe(300), &config).unwrap();

        assert!(report.fallback);
        // The fallback is still the globally best pair.
        let min_p = report
            .candidates
            .iter()
            .filter(|c| !c.coint_p_value.is_nan())
            .map(|c| c.coint_p_value)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(report.selected.coint_p_value, min_p);
    }

    #[test]
    fn test_too_few_series_is_an_error() {
        let series = universe(100).into_iter().take(1).collect::<Vec<_>>();
        assert!(matches!(
            screen(&series, &no_prefilter()),
            Err(ScreeningError::NoCandidates(1))
        ));
    }

    #[test]
    fn test_insufficient_samples_is_an_error() {
        let series = universe(10);
        assert!(matches!(
            screen(&series, &no_prefilter()),
            Err(ScreeningError::InsufficientData { min_samples: 30 })
        ));
    }

    #[test]
    fn test_prefilter_excludes_uncorrelated_pairs() {
        let config = ScreeningConfig {
            prefilter: true,
            correlation_threshold: 0.9,
            ..Default::default()
        };
        let report = screen(&universe(300), &config).unwrap();

        // Whatever survives carries a correlation above the threshold.
        assert!(!report.candidates.is_empty());
        assert!(report
            .candidates
            .iter()
            .all(|c| c.correlation.abs() > 0.9));
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let series = universe(300);
        let config = no_prefilter();

        let first = screen(&series, &config).unwrap();
        let second = screen(&series, &config).unwrap();

        assert_eq!(first.candidates, second.candidates);
        assert_eq!(first.selected, second.selected);
        assert_eq!(first.fallback, second.fallback);
    }

    #[test]
    fn test_max_candidates_truncates_ranking() {
        let config = ScreeningConfig {
            prefilter: false,
            max_candidates: Some(1),
            ..Default::default()
        };
        let report = screen(&universe(300), &config).unwrap();
        assert_eq!(report.candidates.len(), 1);
    }

    #[test]
    fn test_compare_p_ranks_nan_last() {
        assert_eq!(compare_p(0.5, f64::NAN), Ordering::Less);
        assert_eq!(compare_p(f64::NAN, 0.5), Ordering::Greater);
        assert_eq!(compare_p(0.01, 0.5), Ordering::Less);
    }
}
