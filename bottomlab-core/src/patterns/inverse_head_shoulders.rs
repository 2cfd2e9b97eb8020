//! Inverse head & shoulders.
//!
//! Three consecutive local minima LS, H, RS where the head H is below both
//! shoulders and the shoulders are within 10% of each other. The neckline is
//! the higher of the two intermediate reaction highs. The fire is the first
//! close above the neckline within the confirmation window after RS
//! (confirmed), or the RS bar itself (unconfirmed).

use std::collections::BTreeMap;

use super::{local_minima, PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

#[derive(Debug, Clone)]
pub struct InverseHeadShoulders {
    pub shoulder_tolerance: f64,
    pub confirmation_window: usize,
    extrema_radius: usize,
}

impl Default for InverseHeadShoulders {
    fn default() -> Self {
        Self { shoulder_tolerance: 0.10, confirmation_window: 10, extrema_radius: 5 }
    }
}

impl PatternDetector for InverseHeadShoulders {
    fn id(&self) -> &'static str {
        "inverse_head_shoulders"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Primary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let closes = data.closes();
        let n = closes.len();
        if n < 60 {
            return Ok(vec![]);
        }

        let minima = local_minima(&closes, self.extrema_radius);
        let mut fires: Vec<usize> = Vec::new();
        let mut confirmed_count = 0usize;
        let mut last_neckline = f64::NAN;

        for triple in minima.windows(3) {
            let (ls, head, rs) = (triple[0], triple[1], triple[2]);
            let (p_ls, p_head, p_rs) = (closes[ls], closes[head], closes[rs]);

            if !(p_head < p_ls && p_head < p_rs) {
                continue;
            }
            if p_ls <= 0.0 || ((p_ls - p_rs) / p_ls).abs() >= self.shoulder_tolerance {
                continue;
            }

            // Neckline: higher of the two reaction highs between the minima
            let left_high = closes[ls..=head].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let right_high = closes[head..=rs].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let neckline = left_high.max(right_high);

            // Confirmation: first close above the neckline after RS
            let confirm_end = (rs + 1 + self.confirmation_window).min(n);
            let confirmation = (rs + 1..confirm_end).find(|&j| closes[j] > neckline);

            let fire = match confirmation {
                Some(j) => {
                    confirmed_count += 1;
                    j
                }
                None => rs,
            };
            last_neckline = neckline;
            if fires.last() != Some(&fire) {
                fires.push(fire);
            }
        }

        if fires.is_empty() {
            return Ok(vec![]);
        }
        fires.sort_unstable();
        fires.dedup();

        let confirmed_share = confirmed_count as f64 / fires.len() as f64;
        let mut metadata = BTreeMap::new();
        metadata.insert("neckline".to_string(), last_neckline);
        metadata.insert("confirmed_share".to_string(), confirmed_share);

        Ok(vec![Situation {
            id: self.id().to_string(),
            description: "Inverse head & shoulders".to_string(),
            market_data_id: data.id().clone(),
            indices: fires,
            confidence: 0.4 + 0.6 * confirmed_share,
            priority: self.priority(),
            signal_kind: SignalKind::StructuralReversal,
            volume_confirmed: false,
            metadata,
        }])
    }
}
