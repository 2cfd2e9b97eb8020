//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR uses Wilder smoothing (EMA with alpha = 1/period) seeded from the
//! simple mean of the first `period` true-range values.

use crate::domain::Bar;

/// True Range series. TR[0] has no previous close and is NaN so the Wilder
/// seed starts from TR[1].
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];

    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if h.is_nan() || l.is_nan() || pc.is_nan() {
            tr[i] = f64::NAN;
        } else {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }

    tr
}

/// Wilder smoothing: alpha = 1/period, seeded with the mean of the first
/// `period` consecutive non-NaN values.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    // First index from which `period` consecutive non-NaN values exist
    let seed_start = (0..n).find(|&i| {
        i + period <= n && values[i..i + period].iter().all(|v| !v.is_nan())
    });
    let seed_start = match seed_start {
        Some(s) => s,
        None => return result,
    };
    let seed_end = seed_start + period;

    let seed: f64 = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;

    for i in seed_end..n {
        if values[i].is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }

    result
}

/// ATR over bars. First `period` entries are NaN.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    wilder_smooth(&true_range(bars), period)
}
