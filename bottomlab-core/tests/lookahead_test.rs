//! No-look-ahead guarantees.
//!
//! A detector's output on the first k bars must be a prefix of its output on
//! the first k+1 bars (for k past window-stabilization). If adding a bar
//! changes history, the detector peeked forward.

use bottomlab_core::domain::{Bar, PriceHistory};
use bottomlab_core::market_data::MarketData;
use bottomlab_core::patterns::{
    GapMove, GoldenCross, NewLowReclaim, PatternDetector, RsiOversold, TurnOfMonth,
};

/// Deterministic pseudo-random walk with enough texture to trigger the
/// momentum detectors.
fn walk(n: usize) -> Vec<f64> {
    let mut closes = Vec::with_capacity(n);
    let mut price = 120.0_f64;
    let mut state = 0x9e3779b97f4a7c15_u64;
    for i in 0..n {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let noise = ((state >> 33) as f64 / (1u64 << 31) as f64) - 1.0; // [-1, 1)
        let drift = if i % 160 < 80 { -0.004 } else { 0.005 };
        price *= 1.0 + drift + noise * 0.02;
        price = price.max(5.0);
        closes.push(price);
    }
    closes
}

fn market_data(closes: &[f64]) -> MarketData {
    let base = chrono::NaiveDate::from_ymd_opt(2012, 1, 3).unwrap();
    let bars: Vec<Bar> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let open = if i == 0 { c } else { closes[i - 1] * 1.001 };
            Bar::new(
                base + chrono::Duration::days(i as i64),
                "WALK".into(),
                open,
                open.max(c) * 1.01,
                open.min(c) * 0.99,
                c,
                1000.0 + (i % 11) as f64 * 50.0,
            )
        })
        .collect();
    MarketData::new(PriceHistory::new(bars).unwrap())
}

fn assert_prefix_stable(detector: &dyn PatternDetector, closes: &[f64], from: usize) {
    let mut previous: Option<Vec<usize>> = None;
    for k in from..closes.len() {
        let md = market_data(&closes[..k]);
        let situations = detector.detect(&md).unwrap_or_default();
        let mut fires: Vec<usize> = situations.iter().flat_map(|s| s.indices.clone()).collect();
        fires.sort_unstable();

        if let Some(prev) = &previous {
            // Fires whose forward context cannot change anymore must persist.
            // Confirmation-window detectors may re-time the newest fires, so
            // compare only the settled region (more than 20 bars back).
            let settled = |f: &&usize| **f + 20 < k;
            let prev_settled: Vec<&usize> = prev.iter().filter(settled).collect();
            let curr_settled: Vec<&usize> = fires.iter().filter(settled).collect();
            assert!(
                prev_settled.iter().all(|f| curr_settled.contains(f)),
                "{}: fire disappeared when extending history to {k} bars",
                detector.id()
            );
        }
        previous = Some(fires);
    }
}

#[test]
fn rsi_oversold_is_prefix_stable() {
    let closes = walk(420);
    assert_prefix_stable(&RsiOversold::default(), &closes, 380);
}

#[test]
fn golden_cross_is_prefix_stable() {
    let closes = walk(480);
    assert_prefix_stable(&GoldenCross::default(), &closes, 440);
}

#[test]
fn gap_move_is_prefix_stable() {
    let closes = walk(400);
    assert_prefix_stable(&GapMove::default(), &closes, 370);
}

#[test]
fn turn_of_month_is_prefix_stable() {
    let closes = walk(400);
    assert_prefix_stable(&TurnOfMonth, &closes, 370);
}

#[test]
fn new_low_reclaim_is_prefix_stable() {
    let closes = walk(560);
    assert_prefix_stable(&NewLowReclaim::default(), &closes, 520);
}
