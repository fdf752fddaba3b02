//! Market data access seam.
//!
//! The statistical core never talks to a venue directly. Callers inject a
//! [`MarketDataSource`]; tests and replays use [`StaticSource`]. A source
//! that has nothing for an asset returns an empty series; downstream
//! stages treat that as a data condition, not a failure.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::series::PriceSeries;

/// Errors surfaced by a data provider.
#[derive(Error, Debug)]
pub enum DataSourceError {
    /// The provider itself failed (transport, auth, rate limit).
    #[error("data provider failure: {0}")]
    Provider(String),
}

/// Capability to fetch one asset's historical series for a date range.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_series(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, DataSourceError>;
}

/// In-memory source over pre-loaded series. Deterministic; used for replay
/// and tests.
#[derive(Debug, Default)]
pub struct StaticSource {
    series: HashMap<String, PriceSeries>,
}

impl StaticSource {
    pub fn new(series: impl IntoIterator<Item = PriceSeries>) -> Self {
        Self {
            series: series
                .into_iter()
                .map(|s| (s.symbol().to_string(), s))
                .collect(),
        }
    }
}

#[async_trait]
impl MarketDataSource for StaticSource {
    async fn fetch_series(
        &self,
        asset: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries, DataSourceError> {
        let Some(full) = self.series.get(asset) else {
            return Ok(PriceSeries::empty(asset));
        };

        let (start_ts, end_ts) = (start.timestamp(), end.timestamp());
        let points: Vec<(i64, f64)> = full
            .timestamps()
            .iter()
            .zip(full.values().iter())
            .filter(|(ts, _)| (start_ts..=end_ts).contains(*ts))
            .map(|(ts, v)| (*ts, *v))
            .collect();

        // Restriction of a valid index stays valid.
        Ok(PriceSeries::new(asset, points).expect("restricted index stays ordered"))
    }
}

/// Fetch every asset in `assets`, skipping the ones the source has no data
/// for. Returns however many non-empty series were obtained.
pub async fn fetch_universe(
    source: &dyn MarketDataSource,
    assets: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<PriceSeries>, DataSourceError> {
    let mut out = Vec::with_capacity(assets.len());

    for asset in assets {
        let series = source.fetch_series(asset, start, end).await?;
        if series.is_empty() {
            warn!(asset = %asset, "No data received, skipping asset");
            continue;
        }
        out.push(series);
    }

    info!(
        requested = assets.len(),
        fetched = out.len(),
        "Universe fetch complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_static_source_range_restriction() {
        let source = StaticSource::new([PriceSeries::new(
            "AAA",
            vec![(10, 1.0), (20, 2.0), (30, 3.0)],
        )
        .unwrap()]);

        let fetched = source.fetch_series("AAA", ts(15), ts(30)).await.unwrap();
        assert_eq!(fetched.timestamps(), &[20, 30]);
    }

    #[tokio::test]
    async fn test_unknown_asset_yields_empty_series() {
        let source = StaticSource::default();
        let fetched = source.fetch_series("NOPE", ts(0), ts(100)).await.unwrap();
        assert!(fetched.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_universe_skips_empty() {
        let source = StaticSource::new([
            PriceSeries::new("AAA", vec![(10, 1.0), (20, 2.0)]).unwrap(),
            PriceSeries::new("BBB", vec![(10, 5.0), (20, 6.0)]).unwrap(),
        ]);

        let assets = vec!["AAA".to_string(), "GONE".to_string(), "BBB".to_string()];
        let universe = fetch_universe(&source, &assets, ts(0), ts(100))
            .await
            .unwrap();

        let symbols: Vec<&str> = universe.iter().map(|s| s.symbol()).collect();
        assert_eq!(symbols, vec!["AAA", "BBB"]);
    }
}
