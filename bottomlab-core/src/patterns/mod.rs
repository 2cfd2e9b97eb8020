//! Pattern detection — turns `MarketData` into named `Situation`s.
//!
//! Detectors are a polymorphic capability set: each implements
//! `PatternDetector` and is registered by id. PRIMARY detectors describe
//! structural reversals in a declined context and may drive a final buy;
//! SECONDARY detectors are supporting evidence only and are never selected as
//! an instrument's best pattern.
//!
//! Detectors are strictly read-side: no detector may look at bars past the
//! index it fires on.

pub mod bull_flag;
pub mod double_bottom;
pub mod higher_lows;
pub mod inverse_head_shoulders;
pub mod low_reclaim;
pub mod secondary;

pub use bull_flag::BullFlagAfterDecline;
pub use double_bottom::DoubleBottomAfterDecline;
pub use higher_lows::HigherLowsReversal;
pub use inverse_head_shoulders::InverseHeadShoulders;
pub use low_reclaim::NewLowReclaim;
pub use secondary::{GapMove, GoldenCross, RsiOversold, TurnOfMonth};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::MarketDataId;
use crate::error::EngineError;
use crate::market_data::MarketData;

/// PRIMARY patterns may drive a final buy; SECONDARY never can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternPriority {
    Primary,
    Secondary,
}

/// What kind of market event the detector describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    StructuralReversal,
    Momentum,
    Calendar,
}

/// A named market condition with the bar indices where it fired.
///
/// Holds a `MarketDataId` rather than a reference; indices are only valid
/// against the exact `MarketData` they were detected on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Situation {
    pub id: String,
    pub description: String,
    pub market_data_id: MarketDataId,
    /// Bar ordinals where the condition fired. Strictly ascending, all < len.
    pub indices: Vec<usize>,
    /// Detector's own conviction in [0, 1].
    pub confidence: f64,
    pub priority: PatternPriority,
    pub signal_kind: SignalKind,
    /// Whether the detector observed volume behavior confirming the pattern.
    pub volume_confirmed: bool,
    /// Numeric diagnostics (decline depth, neckline level, ...).
    pub metadata: BTreeMap<String, f64>,
}

impl Situation {
    /// Check the index invariant: every fire index is in-bounds and ascending.
    pub fn validate(&self, len: usize) -> Result<(), EngineError> {
        for pair in self.indices.windows(2) {
            if pair[0] >= pair[1] {
                return Err(EngineError::Detection {
                    detector: self.id.clone(),
                    reason: format!("fire indices not ascending: {} >= {}", pair[0], pair[1]),
                });
            }
        }
        if let Some(&last) = self.indices.last() {
            if last >= len {
                return Err(EngineError::Detection {
                    detector: self.id.clone(),
                    reason: format!("fire index {last} past end of {len}-bar series"),
                });
            }
        }
        Ok(())
    }
}

/// Detect-capability: `(MarketData) -> situations`.
pub trait PatternDetector: Send + Sync {
    /// Stable id, used as the situation id and the registry key.
    fn id(&self) -> &'static str;

    fn priority(&self) -> PatternPriority;

    /// Detect every firing of this pattern over the full history.
    ///
    /// Implementations must only use data at or before each fire index.
    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError>;
}

/// Registry mapping detector id to detector. Adding a detector is a registry
/// entry plus a pure function.
pub struct DetectorRegistry {
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl DetectorRegistry {
    pub fn new(detectors: Vec<Box<dyn PatternDetector>>) -> Self {
        Self { detectors }
    }

    /// The full detector library: five structural PRIMARY detectors plus the
    /// SECONDARY supporting-evidence set.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(DoubleBottomAfterDecline::default()),
            Box::new(InverseHeadShoulders::default()),
            Box::new(BullFlagAfterDecline::default()),
            Box::new(HigherLowsReversal::default()),
            Box::new(NewLowReclaim::default()),
            Box::new(RsiOversold::default()),
            Box::new(GoldenCross::default()),
            Box::new(GapMove::default()),
            Box::new(TurnOfMonth::default()),
        ])
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    /// Run every detector. A detector that errors contributes no situations;
    /// its error is returned alongside the survivors so the caller can log it.
    pub fn detect_all(&self, data: &MarketData) -> (Vec<Situation>, Vec<EngineError>) {
        let mut situations = Vec::new();
        let mut errors = Vec::new();
        for detector in &self.detectors {
            match detector.detect(data) {
                Ok(found) => {
                    for situation in found {
                        match situation.validate(data.len()) {
                            Ok(()) => situations.push(situation),
                            Err(e) => errors.push(e),
                        }
                    }
                }
                Err(e) => errors.push(e),
            }
        }
        (situations, errors)
    }
}

/// Indices of local minima of `values`: positions that are the strict minimum
/// of their `radius`-neighborhood (ties resolve to the earliest bar).
pub(crate) fn local_minima(values: &[f64], radius: usize) -> Vec<usize> {
    let n = values.len();
    let mut minima = Vec::new();
    if n == 0 {
        return minima;
    }
    for i in 0..n {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius + 1).min(n);
        let v = values[i];
        if v.is_nan() {
            continue;
        }
        let window_min = values[lo..hi].iter().cloned().fold(f64::INFINITY, f64::min);
        let first_at_min = (lo..hi).find(|&j| values[j] == window_min);
        if v == window_min && first_at_min == Some(i) {
            minima.push(i);
        }
    }
    minima
}
