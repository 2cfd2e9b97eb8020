//! Forward returns at fixed horizons.

use serde::{Deserialize, Serialize};

/// Measurement horizon in bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Horizon(pub usize);

impl Horizon {
    pub fn bars(self) -> usize {
        self.0
    }
}

/// The standard 1/2/3-month horizons. The last is the evaluation horizon.
pub const HORIZONS: [Horizon; 3] = [Horizon(21), Horizon(42), Horizon(63)];

/// Forward return r_h(i) = close[i+h] / close[i] - 1 for each fire index
/// whose full horizon fits inside the series. Fires too close to the end are
/// excluded from that horizon only.
pub fn forward_returns(closes: &[f64], indices: &[usize], horizon: Horizon) -> Vec<f64> {
    let n = closes.len();
    let h = horizon.bars();
    let mut returns = Vec::new();
    for &i in indices {
        let j = i + h;
        if j >= n {
            continue;
        }
        let entry = closes[i];
        let exit = closes[j];
        if entry > 0.0 && !entry.is_nan() && !exit.is_nan() {
            returns.push(exit / entry - 1.0);
        }
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_returns_where_horizon_fits() {
        let closes = [100.0, 101.0, 102.0, 110.0, 120.0];
        let r = forward_returns(&closes, &[0, 2], Horizon(2));
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.02).abs() < 1e-12);
        assert!((r[1] - (120.0 / 102.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn excludes_fires_past_the_end() {
        let closes = [100.0, 101.0, 102.0];
        let r = forward_returns(&closes, &[1, 2], Horizon(2));
        assert!(r.is_empty());
    }

    #[test]
    fn last_valid_fire_is_len_minus_h_minus_one() {
        let closes = [100.0, 110.0, 121.0];
        let r = forward_returns(&closes, &[0], Horizon(2));
        assert_eq!(r.len(), 1);
        assert!((r[0] - 0.21).abs() < 1e-12);
    }
}
