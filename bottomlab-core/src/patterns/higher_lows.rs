//! Higher lows reversal.
//!
//! Three or more successive local minima, each strictly higher than the
//! previous: the signature of a downtrend ending. Fires at the most recent
//! low of each qualifying run.

use std::collections::BTreeMap;

use super::{local_minima, PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

#[derive(Debug, Clone)]
pub struct HigherLowsReversal {
    pub min_lows: usize,
    extrema_radius: usize,
}

impl Default for HigherLowsReversal {
    fn default() -> Self {
        Self { min_lows: 3, extrema_radius: 5 }
    }
}

impl PatternDetector for HigherLowsReversal {
    fn id(&self) -> &'static str {
        "higher_lows_reversal"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Primary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let closes = data.closes();
        if closes.len() < 40 {
            return Ok(vec![]);
        }

        let minima = local_minima(&closes, self.extrema_radius);
        if minima.len() < self.min_lows {
            return Ok(vec![]);
        }

        // Walk the minima, tracking the current strictly-ascending run.
        // A run of length >= min_lows fires at each new low it adds.
        let mut fires = Vec::new();
        let mut run_len = 1usize;
        let mut longest_run = 1usize;
        for w in minima.windows(2) {
            let (prev, curr) = (w[0], w[1]);
            if closes[curr] > closes[prev] {
                run_len += 1;
                if run_len >= self.min_lows {
                    fires.push(curr);
                }
            } else {
                run_len = 1;
            }
            longest_run = longest_run.max(run_len);
        }

        if fires.is_empty() {
            return Ok(vec![]);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("longest_run".to_string(), longest_run as f64);

        Ok(vec![Situation {
            id: self.id().to_string(),
            description: "Higher lows (trend reversal)".to_string(),
            market_data_id: data.id().clone(),
            indices: fires,
            confidence: ((longest_run as f64 - 2.0) / 3.0).clamp(0.3, 1.0),
            priority: self.priority(),
            signal_kind: SignalKind::StructuralReversal,
            volume_confirmed: false,
            metadata,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Downtrend bottoming out with three ascending lows.
    fn ascending_lows_closes() -> Vec<f64> {
        let mut closes = Vec::new();
        for i in 0..20 {
            closes.push(130.0 - i as f64 * 1.5);
        }
        // Low 1 at 100, bounce, low 2 at 103, bounce, low 3 at 106, rally
        let legs: [(f64, f64); 3] = [(100.0, 109.0), (103.0, 112.0), (106.0, 118.0)];
        for (low, high) in legs {
            for i in 0..6 {
                closes.push(closes.last().unwrap() - (closes.last().unwrap() - low) * (i + 1) as f64 / 6.0);
            }
            closes.push(low);
            for i in 0..6 {
                closes.push(low + (high - low) * (i + 1) as f64 / 6.0);
            }
        }
        closes
    }

    #[test]
    fn detects_three_higher_lows() {
        let md = super::super::tests::market_data_from_closes(&ascending_lows_closes());
        let situations = HigherLowsReversal::default().detect(&md).unwrap();
        assert_eq!(situations.len(), 1);
        let s = &situations[0];
        assert!(!s.indices.is_empty());
        assert!(s.metadata["longest_run"] >= 3.0);
    }

    #[test]
    fn descending_lows_do_not_fire() {
        let mut closes = Vec::new();
        // Lower lows all the way down
        let legs: [(f64, f64); 3] = [(110.0, 118.0), (104.0, 112.0), (98.0, 106.0)];
        closes.push(125.0);
        for (low, high) in legs {
            for i in 0..8 {
                closes.push(closes.last().unwrap() - (closes.last().unwrap() - low) * (i + 1) as f64 / 8.0);
            }
            for i in 0..8 {
                closes.push(low + (high - low) * (i + 1) as f64 / 8.0);
            }
        }
        let md = super::super::tests::market_data_from_closes(&closes);
        let situations = HigherLowsReversal::default().detect(&md).unwrap();
        assert!(situations.is_empty());
    }
}
