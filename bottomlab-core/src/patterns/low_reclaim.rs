//! New multi-period low reclaim.
//!
//! Price sets a 252-bar low, then closes back above its EMA(20) within 5
//! bars: a washout immediately bought back. Fires at the reclaim bar.

use std::collections::BTreeMap;

use super::{PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

#[derive(Debug, Clone)]
pub struct NewLowReclaim {
    pub low_lookback: usize,
    pub ema_period: usize,
    pub reclaim_window: usize,
}

impl Default for NewLowReclaim {
    fn default() -> Self {
        Self { low_lookback: 252, ema_period: 20, reclaim_window: 5 }
    }
}

impl PatternDetector for NewLowReclaim {
    fn id(&self) -> &'static str {
        "new_low_reclaim"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Primary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let closes = data.closes();
        let n = closes.len();
        if n < self.low_lookback + 1 {
            return Ok(vec![]);
        }
        let ema = data.ema(self.ema_period);

        let mut fires = Vec::new();
        let mut i = self.low_lookback;
        while i < n {
            let window_low = closes[i - self.low_lookback..i]
                .iter()
                .cloned()
                .fold(f64::INFINITY, f64::min);
            if closes[i] >= window_low {
                i += 1;
                continue;
            }

            // New multi-period low at i; look for the reclaim
            let reclaim_end = (i + 1 + self.reclaim_window).min(n);
            let reclaim = (i + 1..reclaim_end)
                .find(|&j| !ema[j].is_nan() && closes[j] > ema[j]);
            if let Some(j) = reclaim {
                fires.push(j);
                i = j + 1; // one fire per washout
            } else {
                i += 1;
            }
        }

        if fires.is_empty() {
            return Ok(vec![]);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("fire_count".to_string(), fires.len() as f64);

        Ok(vec![Situation {
            id: self.id().to_string(),
            description: "New 252-bar low reclaimed above EMA(20)".to_string(),
            market_data_id: data.id().clone(),
            indices: fires,
            confidence: 0.6,
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

    #[test]
    fn detects_reclaim_after_washout() {
        // Long slow decline so the EMA(20) hugs the price, then a sharp
        // washout below the 252-bar low, then a V-recovery above the EMA.
        let mut closes = Vec::new();
        for i in 0..260 {
            closes.push(120.0 - i as f64 * 0.02); // drifts to ~114.8
        }
        closes.push(100.0); // deep new low
        for i in 0..4 {
            closes.push(105.0 + i as f64 * 4.0); // sharp recovery over EMA
        }
        let md = super::super::tests::market_data_from_closes(&closes);
        let situations = NewLowReclaim::default().detect(&md).unwrap();
        assert_eq!(situations.len(), 1);
        let s = &situations[0];
        assert!(!s.indices.is_empty());
        assert!(s.indices[0] > 260);
    }

    #[test]
    fn no_fire_when_low_not_reclaimed() {
        let mut closes = Vec::new();
        for i in 0..260 {
            closes.push(120.0 - i as f64 * 0.02);
        }
        // New low and it keeps falling
        for i in 0..10 {
            closes.push(100.0 - i as f64);
        }
        let md = super::super::tests::market_data_from_closes(&closes);
        assert!(NewLowReclaim::default().detect(&md).unwrap().is_empty());
    }

    #[test]
    fn short_history_fires_nothing() {
        let md = super::super::tests::market_data_from_closes(&vec![100.0; 100]);
        assert!(NewLowReclaim::default().detect(&md).unwrap().is_empty());
    }
}
