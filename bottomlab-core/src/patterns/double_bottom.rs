//! Double bottom after decline (W-pattern).
//!
//! Criteria, evaluated over scan windows of 40/60/80/100/120 bars ending at
//! the candidate fire bar:
//! - two local minima L1, L2 at least 10 bars apart with |L2-L1|/L1 < 5%
//! - a reaction high between them at least 2% above L1
//! - volume at L2 below volume at L1 (selling exhaustion)
//! - the 90-bar high before the window exceeds L2 by at least 10%
//!
//! Fire index = bar of L2.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use super::{local_minima, PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

#[derive(Debug, Clone)]
pub struct DoubleBottomAfterDecline {
    pub scan_windows: Vec<usize>,
    pub min_gap_bars: usize,
    pub low_tolerance: f64,
    pub min_bounce: f64,
    pub min_prior_decline: f64,
    pub prior_high_lookback: usize,
    extrema_radius: usize,
}

impl Default for DoubleBottomAfterDecline {
    fn default() -> Self {
        Self {
            scan_windows: vec![40, 60, 80, 100, 120],
            min_gap_bars: 10,
            low_tolerance: 0.05,
            min_bounce: 0.02,
            min_prior_decline: 0.10,
            prior_high_lookback: 90,
            extrema_radius: 5,
        }
    }
}

impl PatternDetector for DoubleBottomAfterDecline {
    fn id(&self) -> &'static str {
        "double_bottom_after_decline"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Primary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let closes = data.closes();
        let volumes = data.history().volumes();
        let n = closes.len();
        let min_window = self.scan_windows.iter().min().copied().unwrap_or(40);
        if n < min_window {
            return Ok(vec![]);
        }

        let minima = local_minima(&closes, self.extrema_radius);
        let mut fires: BTreeSet<usize> = BTreeSet::new();
        let mut deepest_decline = 0.0_f64;

        for (a, &l1) in minima.iter().enumerate() {
            for &l2 in &minima[a + 1..] {
                if l2 - l1 < self.min_gap_bars {
                    continue;
                }
                let p1 = closes[l1];
                let p2 = closes[l2];
                if p1 <= 0.0 || ((p2 - p1) / p1).abs() >= self.low_tolerance {
                    continue;
                }

                // Reaction high between the two lows
                let reaction = closes[l1..=l2].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                if (reaction - p1) / p1 < self.min_bounce {
                    continue;
                }

                // Selling exhaustion: second test on lighter volume
                if volumes[l2] >= volumes[l1] {
                    continue;
                }

                // Prior decline: some scan window ending at L2 must have a
                // 90-bar high before it that exceeds L2 by the threshold
                let window_end = l2 + 1;
                let declined = self.scan_windows.iter().any(|&w| {
                    if window_end < w {
                        return false;
                    }
                    let start = window_end - w;
                    if start == 0 {
                        return false;
                    }
                    if l1 < start {
                        return false;
                    }
                    let prior_start = start.saturating_sub(self.prior_high_lookback);
                    let prior_high = closes[prior_start..start]
                        .iter()
                        .cloned()
                        .fold(f64::NEG_INFINITY, f64::max);
                    prior_high >= p2 * (1.0 + self.min_prior_decline)
                });
                if !declined {
                    continue;
                }

                let prior_start = l2.saturating_sub(self.prior_high_lookback + min_window);
                let prior_high = closes[prior_start..l2]
                    .iter()
                    .cloned()
                    .fold(f64::NEG_INFINITY, f64::max);
                deepest_decline = deepest_decline.max((prior_high - p2) / prior_high);
                fires.insert(l2);
            }
        }

        if fires.is_empty() {
            return Ok(vec![]);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("deepest_decline".to_string(), deepest_decline);
        metadata.insert("fire_count".to_string(), fires.len() as f64);

        Ok(vec![Situation {
            id: self.id().to_string(),
            description: "Double bottom after decline (W-pattern)".to_string(),
            market_data_id: data.id().clone(),
            indices: fires.into_iter().collect(),
            confidence: (deepest_decline / 0.30).clamp(0.3, 1.0),
            priority: self.priority(),
            signal_kind: SignalKind::StructuralReversal,
            volume_confirmed: true,
            metadata,
        }])
    }
}
