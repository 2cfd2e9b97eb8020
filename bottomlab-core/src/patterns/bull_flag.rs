//! Bull flag after decline.
//!
//! Not the classic continuation flag: here the sequence is
//! DECLINE (>= 15%) -> sideways channel whose realized volatility is lower
//! than the decline phase's, lasting 10-30 bars. Fires at the channel end.

use std::collections::BTreeMap;

use super::{PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

#[derive(Debug, Clone)]
pub struct BullFlagAfterDecline {
    pub min_decline: f64,
    pub decline_lookback: usize,
    pub min_channel_bars: usize,
    pub max_channel_bars: usize,
    /// Channel CV must be below this fraction of the decline-phase CV.
    pub vol_contraction: f64,
}

impl Default for BullFlagAfterDecline {
    fn default() -> Self {
        Self {
            min_decline: 0.15,
            decline_lookback: 60,
            min_channel_bars: 10,
            max_channel_bars: 30,
            vol_contraction: 0.7,
        }
    }
}

/// Coefficient of variation of a slice; NaN on empty or non-positive mean.
fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return f64::NAN;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt() / mean
}

impl PatternDetector for BullFlagAfterDecline {
    fn id(&self) -> &'static str {
        "bull_flag_after_decline"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Primary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let closes = data.closes();
        let n = closes.len();
        let min_needed = self.decline_lookback + self.min_channel_bars;
        if n < min_needed {
            return Ok(vec![]);
        }

        let mut fires: Vec<usize> = Vec::new();
        let mut deepest_decline = 0.0_f64;

        for end in min_needed..n {
            // Channel candidate: the trailing `min_channel_bars` closes.
            // Longer channels up to max_channel_bars re-fire on later ends,
            // which dedupe below via the stride on consecutive fires.
            let channel_start = end + 1 - self.min_channel_bars;
            let channel = &closes[channel_start..=end];

            // Decline phase: the stretch before the channel
            let decline_start = channel_start.saturating_sub(self.decline_lookback);
            let decline_phase = &closes[decline_start..channel_start];
            if decline_phase.len() < self.min_channel_bars {
                continue;
            }

            let decline_high = decline_phase.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let channel_low = channel.iter().cloned().fold(f64::INFINITY, f64::min);
            if decline_high <= 0.0 {
                continue;
            }
            let decline = (decline_high - channel_low) / decline_high;
            if decline < self.min_decline {
                continue;
            }

            let channel_cv = coefficient_of_variation(channel);
            let decline_cv = coefficient_of_variation(decline_phase);
            if channel_cv.is_nan() || decline_cv.is_nan() {
                continue;
            }
            if channel_cv >= decline_cv * self.vol_contraction {
                continue;
            }

            // One fire per base: skip bars that extend an already-fired channel
            if let Some(&last) = fires.last() {
                if end - last < self.max_channel_bars {
                    continue;
                }
            }
            deepest_decline = deepest_decline.max(decline);
            fires.push(end);
        }

        if fires.is_empty() {
            return Ok(vec![]);
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("deepest_decline".to_string(), deepest_decline);
        metadata.insert("fire_count".to_string(), fires.len() as f64);

        Ok(vec![Situation {
            id: self.id().to_string(),
            description: "Bull flag (base) after decline".to_string(),
            market_data_id: data.id().clone(),
            indices: fires,
            confidence: (deepest_decline / 0.30).clamp(0.3, 1.0),
            priority: self.priority(),
            signal_kind: SignalKind::StructuralReversal,
            volume_confirmed: false,
            metadata,
        }])
    }
}
