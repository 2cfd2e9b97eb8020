//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0; no movement → 50.

/// RSI over a close series. First `period` entries are NaN.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period + 1 {
        return result;
    }

    let mut changes = vec![f64::NAN; n];
    for i in 1..n {
        let curr = closes[i];
        let prev = closes[i - 1];
        if curr.is_nan() || prev.is_nan() {
            changes[i] = f64::NAN;
        } else {
            changes[i] = curr - prev;
        }
    }

    // Seed: average gain and loss over the first `period` changes
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[1..=period] {
        if ch.is_nan() {
            return result;
        }
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    result[period] = rsi_from_averages(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        if changes[i].is_nan() {
            for val in result.iter_mut().skip(i) {
                *val = f64::NAN;
            }
            return result;
        }

        let gain = if changes[i] > 0.0 { changes[i] } else { 0.0 };
        let loss = if changes[i] < 0.0 { -changes[i] } else { 0.0 };

        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;

        result[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn rsi_all_gains_is_100() {
        let result = rsi(&[100.0, 101.0, 102.0, 103.0, 104.0, 105.0], 3);
        assert!(result[2].is_nan());
        assert_approx(result[3], 100.0, DEFAULT_EPSILON);
        assert_approx(result[5], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let result = rsi(&[105.0, 104.0, 103.0, 102.0, 101.0], 3);
        assert_approx(result[3], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_flat_is_50() {
        let result = rsi(&[100.0, 100.0, 100.0, 100.0, 100.0], 3);
        assert_approx(result[3], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_leading_nan_count() {
        let result = rsi(&[100.0, 101.0, 99.0, 102.0, 101.0, 103.0], 2);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert!(!result[2].is_nan());
    }

    #[test]
    fn rsi_balanced_moves() {
        // period 2, changes +1, -1 → avg_gain = avg_loss = 0.5 → RSI 50
        let result = rsi(&[100.0, 101.0, 100.0], 2);
        assert_approx(result[2], 50.0, DEFAULT_EPSILON);
    }
}
