//! Time-indexed price series and alignment.
//!
//! All downstream statistics operate on series restricted to a common
//! timestamp set. Alignment intersects the timestamp sets of the inputs and
//! re-emits each series over the sorted intersection, dropping gaps.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::warn;

/// Errors raised by series construction and alignment.
#[derive(Error, Debug)]
pub enum SeriesError {
    /// The inputs share no timestamps at all.
    #[error("series have no overlapping timestamps")]
    EmptyAlignment,

    /// Fewer than two series were supplied to an alignment.
    #[error("alignment needs at least 2 series, got {0}")]
    NotEnoughSeries(usize),

    /// A timestamp repeats within one series.
    #[error("duplicate timestamp {timestamp} in series {symbol}")]
    DuplicateTimestamp { symbol: String, timestamp: i64 },

    /// Timestamps are not strictly increasing.
    #[error("timestamps out of order at {timestamp} in series {symbol}")]
    UnorderedTimestamp { symbol: String, timestamp: i64 },
}

/// Ordered (timestamp, price) observations for a single asset.
///
/// Construction validates that timestamps are strictly increasing with no
/// duplicates; the series is immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    timestamps: Vec<i64>,
    values: Vec<f64>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        points: impl IntoIterator<Item = (i64, f64)>,
    ) -> Result<Self, SeriesError> {
        let symbol = symbol.into();
        let mut timestamps = Vec::new();
        let mut values = Vec::new();

        for (ts, value) in points {
            match timestamps.last() {
                Some(&prev) if ts == prev => {
                    return Err(SeriesError::DuplicateTimestamp {
                        symbol,
                        timestamp: ts,
                    })
                }
                Some(&prev) if ts < prev => {
                    return Err(SeriesError::UnorderedTimestamp {
                        symbol,
                        timestamp: ts,
                    })
                }
                _ => {}
            }
            timestamps.push(ts);
            values.push(value);
        }

        Ok(Self {
            symbol,
            timestamps,
            values,
        })
    }

    /// An empty series for `symbol`. Data sources return this on failure;
    /// downstream stages treat it as a data condition, not an error.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Two price series restricted to their common timestamp set.
///
/// Invariant: both legs have identical length and identical timestamp
/// sequence. The only constructor is [`align_pair`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    symbol_a: String,
    symbol_b: String,
    timestamps: Vec<i64>,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl AlignedPair {
    pub fn symbol_a(&self) -> &str {
        &self.symbol_a
    }

    pub fn symbol_b(&self) -> &str {
        &self.symbol_b
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// The spread `a − hedge_ratio × b` over the pair's common index.
    /// Pass `hedge_ratio = 1.0` for the unweighted variant.
    pub fn spread(&self, hedge_ratio: f64) -> SpreadSeries {
        let values = self
            .a
            .iter()
            .zip(self.b.iter())
            .map(|(x, y)| x - hedge_ratio * y)
            .collect();
        SpreadSeries {
            timestamps: self.timestamps.clone(),
            values,
        }
    }
}

/// A derived numeric series over a pair's common index.
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSeries {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl SpreadSeries {
    pub fn new(timestamps: Vec<i64>, values: Vec<f64>) -> Self {
        assert_eq!(
            timestamps.len(),
            values.len(),
            "spread index and values must have equal length"
        );
        Self { timestamps, values }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Restrict two series to their common timestamps, in increasing order.
pub fn align_pair(a: &PriceSeries, b: &PriceSeries) -> Result<AlignedPair, SeriesError> {
    let set_b: HashSet<i64> = b.timestamps().iter().copied().collect();
    let lookup_b: HashMap<i64, f64> = b
        .timestamps()
        .iter()
        .copied()
        .zip(b.values().iter().copied())
        .collect();

    let mut timestamps = Vec::new();
    let mut values_a = Vec::new();
    let mut values_b = Vec::new();

    for (ts, value) in a.timestamps().iter().zip(a.values().iter()) {
        if set_b.contains(ts) {
            timestamps.push(*ts);
            values_a.push(*value);
            values_b.push(lookup_b[ts]);
        }
    }

    if timestamps.is_empty() {
        return Err(SeriesError::EmptyAlignment);
    }

    Ok(AlignedPair {
        symbol_a: a.symbol().to_string(),
        symbol_b: b.symbol().to_string(),
        timestamps,
        a: values_a,
        b: values_b,
    })
}

/// Restrict every input series to the timestamps present in all of them.
pub fn align_many(series: &[PriceSeries]) -> Result<Vec<PriceSeries>, SeriesError> {
    if series.len() < 2 {
        return Err(SeriesError::NotEnoughSeries(series.len()));
    }

    let mut common: Option<HashSet<i64>> = None;
    for s in series {
        let set: HashSet<i64> = s.timestamps().iter().copied().collect();
        common = Some(match common {
            Some(existing) => existing.intersection(&set).copied().collect(),
            None => set,
        });
    }

    let common = common.unwrap_or_default();
    if common.is_empty() {
        warn!(series = series.len(), "No common timestamps across inputs");
        return Err(SeriesError::EmptyAlignment);
    }

    let mut sorted: Vec<i64> = common.into_iter().collect();
    sorted.sort_unstable();

    let mut aligned = Vec::with_capacity(series.len());
    for s in series {
        let lookup: HashMap<i64, f64> = s
            .timestamps()
            .iter()
            .copied()
            .zip(s.values().iter().copied())
            .collect();
        let points: Vec<(i64, f64)> = sorted.iter().map(|ts| (*ts, lookup[ts])).collect();
        // Sorted unique timestamps cannot fail validation.
        aligned.push(PriceSeries::new(s.symbol(), points).expect("sorted unique index"));
    }

    Ok(aligned)
}
