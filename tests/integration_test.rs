use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use rust_decimal_macros::dec;

use statarb::backtest::{simulate, BacktestConfig, Direction};
use statarb::data::{fetch_universe, DataSourceError, MarketDataSource};
use statarb::metrics::{max_drawdown, sharpe_ratio};
use statarb::screening::{screen, ScreeningConfig};
use statarb::series::{align_pair, PriceSeries, SpreadSeries};
use statarb::signal::{generate_signal, SignalConfig, Windowing};

// --- Mocks ---

mock! {
    pub DataSource {}

    #[async_trait]
    impl MarketDataSource for DataSource {
        async fn fetch_series(
            &self,
            asset: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<PriceSeries, DataSourceError>;
    }
}

// --- Fixtures ---

fn pseudo_noise(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
}

/// AAA and BBB cointegrated, CCC an unrelated drifting walk.
fn synthetic_universe(len: usize) -> Vec<PriceSeries> {
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

fn series_for(universe: &[PriceSeries], asset: &str) -> PriceSeries {
    universe
        .iter()
        .find(|s| s.symbol() == asset)
        .cloned()
        .unwrap_or_else(|| PriceSeries::empty(asset))
}

fn no_prefilter() -> ScreeningConfig {
    ScreeningConfig {
        prefilter: false,
        ..Default::default()
    }
}

// --- Tests ---

#[tokio::test]
async fn test_full_pipeline_from_mocked_source() {
    let universe = synthetic_universe(300);

    let mut source = MockDataSource::new();
    {
        let universe = universe.clone();
        source
            .expect_fetch_series()
            .returning(move |asset, _, _| Ok(series_for(&universe, asset)));
    }

    let assets = vec![
        "AAA".to_string(),
        "BBB".to_string(),
        "CCC".to_string(),
        "MISSING".to_string(),
    ];
    let start = Utc.timestamp_opt(0, 0).unwrap();
    let end = Utc.timestamp_opt(1_000, 0).unwrap();

    // The missing asset comes back empty and is dropped, not fatal.
    let fetched = fetch_universe(&source, &assets, start, end).await.unwrap();
    assert_eq!(fetched.len(), 3);

    let report = screen(&fetched, &no_prefilter()).unwrap();
    assert!(!report.fallback);
    assert_eq!(report.selected.symbol_a, "AAA");
    assert_eq!(report.selected.symbol_b, "BBB");

    let a = series_for(&fetched, &report.selected.symbol_a);
    let b = series_for(&fetched, &report.selected.symbol_b);
    let aligned = align_pair(&a, &b).unwrap();
    let spread = aligned.spread(report.selected.hedge_ratio);

    let signal = generate_signal(&spread, &SignalConfig::default());
    let backtest = simulate(&spread, &signal, &BacktestConfig::default()).unwrap();

    assert!(backtest.diagnostic.is_none());
    assert_eq!(backtest.equity.len(), signal.defined_len());
    for trade in &backtest.trades {
        assert!(trade.exit_timestamp > trade.entry_timestamp);
    }

    let drawdown = max_drawdown(&backtest.equity);
    assert!(drawdown <= dec!(0));

    let (ratio, mean_pct) = sharpe_ratio(&backtest.equity, 0.02);
    assert_eq!(ratio.is_nan(), mean_pct.is_nan());
}

#[test]
fn test_identical_series_produce_no_trades() {
    // A = t, B = t: the spread is identically zero, every local standard
    // deviation is zero, so the z-score is undefined everywhere and the
    // simulator returns an empty trade log.
    let a = PriceSeries::new("AAA", (0..100).map(|t| (t, t as f64))).unwrap();
    let b = PriceSeries::new("BBB", (0..100).map(|t| (t, t as f64))).unwrap();

    let aligned = align_pair(&a, &b).unwrap();
    let spread = aligned.spread(1.0);
    assert!(spread.values.iter().all(|v| *v == 0.0));

    let signal = generate_signal(&spread, &SignalConfig::default());
    assert_eq!(signal.defined_len(), 0);

    let report = simulate(&spread, &signal, &BacktestConfig::default()).unwrap();
    assert!(report.trades.is_empty());
    assert!(report.equity.is_empty());
    assert!(report.diagnostic.is_some());
}

#[test]
fn test_entry_and_exit_follow_the_spread_jump() {
    // The spread jumps to 1, then reverts toward zero with a small
    // wiggle at the end so the last window's mean lands on the value and
    // the z-score re-enters the exit band.
    let values = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.4, 0.2, 0.3];
    let spread = SpreadSeries::new((0..values.len() as i64).collect(), values.to_vec());

    let signal_config = SignalConfig {
        windowing: Windowing::Rolling,
        window: 3,
        min_periods: None,
        smoothing: None,
    };
    let signal = generate_signal(&spread, &signal_config);

    let config = BacktestConfig {
        entry_threshold: 1.0,
        exit_threshold: 0.2,
        ..Default::default()
    };
    let report = simulate(&spread, &signal, &config).unwrap();

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    // z > +1 right after the jump: short the spread at its high.
    assert_eq!(trade.direction, Direction::Short);
    assert_eq!(trade.entry_timestamp, 3);
    assert_eq!(trade.entry_price, 1.0);
    // Exit once the spread has come back near zero.
    assert_eq!(trade.exit_timestamp, 8);
    assert_eq!(trade.exit_price, 0.3);
    assert!(trade.realized_pnl > dec!(0));

    // Gross move exceeds the costs: the curve never decreases.
    for pair in report.equity.windows(2) {
        assert!(pair[1].equity >= pair[0].equity);
    }
    assert!(report.equity.last().unwrap().equity > dec!(0));
}

#[test]
fn test_fallback_flag_reported_through_pipeline() {
    let universe = synthetic_universe(300);
    let config = ScreeningConfig {
        prefilter: false,
        significance_level: 1e-9,
        ..Default::default()
    };

    let report = screen(&universe, &config).unwrap();
    assert!(report.fallback);

    // The fallback selection is exactly the globally best candidate.
    let min_p = report
        .candidates
        .iter()
        .filter(|c| !c.coint_p_value.is_nan())
        .map(|c| c.coint_p_value)
        .fold(f64::INFINITY, f64::min);
    assert_eq!(report.selected.coint_p_value, min_p);
}

#[test]
fn test_screening_is_idempotent() {
    let universe = synthetic_universe(300);
    let config = no_prefilter();

    let first = screen(&universe, &config).unwrap();
    let second = screen(&universe, &config).unwrap();

    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.selected.hedge_ratio, second.selected.hedge_ratio);
}

#[test]
fn test_signal_config_round_trips_through_json() {
    let config = SignalConfig {
        windowing: Windowing::Exponential,
        window: 20,
        min_periods: Some(10),
        smoothing: Some(5),
    };

    let json = serde_json::to_string(&config).unwrap();
    let back: SignalConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back.windowing, Windowing::Exponential);
    assert_eq!(back.window, 20);
    assert_eq!(back.min_periods, Some(10));
    assert_eq!(back.smoothing, Some(5));
}
