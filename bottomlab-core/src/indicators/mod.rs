//! Derived-series primitives.
//!
//! All functions return a series of the same length as their input with NaN
//! where the window is not yet full. No function looks at data past the index
//! it is computing — the value at `i` depends only on bars `<= i`.

pub mod atr;
pub mod ema;
pub mod returns;
pub mod rolling;
pub mod rsi;

pub use atr::{atr, true_range, wilder_smooth};
pub use ema::ema;
pub use returns::{log_returns, simple_returns};
pub use rolling::{rolling_mean, rolling_std};
pub use rsi::rsi;

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev close (or close for first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0, volume 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
