//! Property tests for core invariants.
//!
//! 1. Every derived series has the same length as the price series, with the
//!    leading entries NaN while the window fills
//! 2. Every situation index is in-bounds
//! 3. Laplace smoothing stays inside (0, 1) and converges to the raw rate
//! 4. Robust and confidence scores stay inside [0, 100]
//! 5. Wilson interval brackets the point estimate and narrows with n

use proptest::prelude::*;

use bottomlab_core::domain::{Bar, PriceHistory};
use bottomlab_core::market_data::MarketData;
use bottomlab_core::patterns::DetectorRegistry;
use bottomlab_core::stats::{wilson_interval, RobustStatistics};

// ── Strategies ───────────────────────────────────────────────────────

fn arb_closes(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(10.0..500.0_f64, min_len..max_len)
}

fn arb_returns() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.5..0.5_f64, 1..200)
}

fn market_data(closes: &[f64]) -> MarketData {
    let base = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    let bars: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                base + chrono::Duration::days(i as i64),
                "PROP".into(),
                c,
                c * 1.02,
                c * 0.98,
                c,
                1000.0 + (i % 7) as f64 * 100.0,
            )
        })
        .collect();
    MarketData::new(PriceHistory::new(bars).unwrap())
}

// ── 1. Series alignment ──────────────────────────────────────────────

proptest! {
    #[test]
    fn derived_series_lengths_match(closes in arb_closes(2, 120), window in 2usize..20) {
        let md = market_data(&closes);
        let n = md.len();
        prop_assert_eq!(md.returns().len(), n);
        prop_assert_eq!(md.rolling_mean(window).len(), n);
        prop_assert_eq!(md.rolling_std(window).len(), n);
        prop_assert_eq!(md.ema(window).len(), n);
        prop_assert_eq!(md.rsi(window).len(), n);
        prop_assert_eq!(md.atr(window).len(), n);
    }

    #[test]
    fn window_indicators_lead_with_nan(closes in arb_closes(25, 80), window in 2usize..20) {
        let md = market_data(&closes);
        let mean = md.rolling_mean(window);
        for v in mean.iter().take(window - 1) {
            prop_assert!(v.is_nan());
        }
        // After the window fills, values exist (prices are clean here)
        if md.len() >= window {
            prop_assert!(!mean[window - 1].is_nan());
        }
        let ema = md.ema(window);
        for v in ema.iter().take(window - 1) {
            prop_assert!(v.is_nan());
        }
    }
}

// ── 2. Situation bounds ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn situations_stay_in_bounds(closes in arb_closes(60, 400)) {
        let md = market_data(&closes);
        let registry = DetectorRegistry::standard();
        let (situations, _errors) = registry.detect_all(&md);
        for s in &situations {
            for &i in &s.indices {
                prop_assert!(i < md.len());
            }
            for pair in s.indices.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}

// ── 3 & 4. Robust statistics ─────────────────────────────────────────

proptest! {
    #[test]
    fn adjusted_win_rate_in_open_unit_interval(returns in arb_returns()) {
        let stats = RobustStatistics::from_returns(&returns);
        prop_assert!(stats.adjusted_win_rate > 0.0);
        prop_assert!(stats.adjusted_win_rate < 1.0);
    }

    #[test]
    fn scores_bounded(returns in arb_returns()) {
        let stats = RobustStatistics::from_returns(&returns);
        prop_assert!((0.0..=100.0).contains(&stats.confidence_score));
        prop_assert!((0.0..=100.0).contains(&stats.robust_score));
        prop_assert!((0.0..=1.0).contains(&stats.sample_size_factor));
    }

    #[test]
    fn smoothing_converges_to_raw(wins in 0usize..50, scale in 1usize..40) {
        // Same win proportion at n and at n*scale: the larger sample's
        // adjusted rate must sit at least as close to the raw rate
        let n = 50usize;
        let mk = |w: usize, total: usize| -> Vec<f64> {
            (0..total).map(|i| if i < w { 0.05 } else { -0.05 }).collect()
        };
        let raw = wins as f64 / n as f64;
        let small = RobustStatistics::from_returns(&mk(wins, n));
        let large = RobustStatistics::from_returns(&mk(wins * scale, n * scale));
        prop_assert!(
            (large.adjusted_win_rate - raw).abs() <= (small.adjusted_win_rate - raw).abs() + 1e-12
        );
    }
}

// ── 5. Wilson interval ───────────────────────────────────────────────

proptest! {
    #[test]
    fn wilson_brackets_point_estimate(wins in 0usize..200, extra in 0usize..200) {
        let trials = wins + extra;
        prop_assume!(trials > 0);
        let ci = wilson_interval(wins, trials);
        prop_assert!(ci.lower <= ci.point_estimate + 1e-12);
        prop_assert!(ci.point_estimate <= ci.upper + 1e-12);
        prop_assert!(ci.lower >= 0.0 && ci.upper <= 1.0);
    }

    #[test]
    fn wilson_width_shrinks_as_n_grows(wins in 1usize..50, scale in 2usize..20) {
        let n = 60usize;
        let small = wilson_interval(wins, n);
        let large = wilson_interval(wins * scale, n * scale);
        prop_assert!(large.width() < small.width() + 1e-12);
    }
}
