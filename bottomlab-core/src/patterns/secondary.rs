//! SECONDARY detectors: supporting evidence, never a best pattern.
//!
//! Retained for diagnostics and as context on the score record; the screener
//! will not select any of these as an instrument's driving pattern.

use std::collections::BTreeMap;

use chrono::Datelike;

use super::{PatternDetector, PatternPriority, SignalKind, Situation};
use crate::error::EngineError;
use crate::market_data::MarketData;

fn situation(
    detector: &dyn PatternDetector,
    data: &MarketData,
    description: &str,
    kind: SignalKind,
    indices: Vec<usize>,
    confidence: f64,
) -> Situation {
    let mut metadata = BTreeMap::new();
    metadata.insert("fire_count".to_string(), indices.len() as f64);
    Situation {
        id: detector.id().to_string(),
        description: description.to_string(),
        market_data_id: data.id().clone(),
        indices,
        confidence,
        priority: PatternPriority::Secondary,
        signal_kind: kind,
        volume_confirmed: false,
        metadata,
    }
}

/// RSI(14) below 30: classic oversold reading.
#[derive(Debug, Clone)]
pub struct RsiOversold {
    pub period: usize,
    pub threshold: f64,
}

impl Default for RsiOversold {
    fn default() -> Self {
        Self { period: 14, threshold: 30.0 }
    }
}

impl PatternDetector for RsiOversold {
    fn id(&self) -> &'static str {
        "rsi_oversold"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Secondary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let rsi = data.rsi(self.period);
        let indices: Vec<usize> = rsi
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan() && **v < self.threshold)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![situation(
            self,
            data,
            "RSI(14) oversold (< 30)",
            SignalKind::Momentum,
            indices,
            0.4,
        )])
    }
}

/// EMA(50) crossing above EMA(200).
#[derive(Debug, Clone)]
pub struct GoldenCross {
    pub fast: usize,
    pub slow: usize,
}

impl Default for GoldenCross {
    fn default() -> Self {
        Self { fast: 50, slow: 200 }
    }
}

impl PatternDetector for GoldenCross {
    fn id(&self) -> &'static str {
        "golden_cross"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Secondary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        if self.fast >= self.slow {
            return Err(EngineError::Detection {
                detector: self.id().to_string(),
                reason: format!("fast period {} must be below slow {}", self.fast, self.slow),
            });
        }
        let fast = data.ema(self.fast);
        let slow = data.ema(self.slow);
        let mut indices = Vec::new();
        for i in 1..data.len() {
            let (f0, f1) = (fast[i - 1], fast[i]);
            let (s0, s1) = (slow[i - 1], slow[i]);
            if f0.is_nan() || f1.is_nan() || s0.is_nan() || s1.is_nan() {
                continue;
            }
            if f0 <= s0 && f1 > s1 {
                indices.push(i);
            }
        }
        if indices.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![situation(
            self,
            data,
            "Golden cross (EMA50 over EMA200)",
            SignalKind::Momentum,
            indices,
            0.5,
        )])
    }
}

/// Overnight gap beyond 2% in either direction. Emits one situation per
/// direction so outcomes can be measured separately.
#[derive(Debug, Clone)]
pub struct GapMove {
    pub threshold: f64,
}

impl Default for GapMove {
    fn default() -> Self {
        Self { threshold: 0.02 }
    }
}

impl PatternDetector for GapMove {
    fn id(&self) -> &'static str {
        "gap_move"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Secondary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let bars = data.history().bars();
        let mut gap_up = Vec::new();
        let mut gap_down = Vec::new();
        for i in 1..bars.len() {
            let prev_close = bars[i - 1].close;
            if prev_close <= 0.0 {
                continue;
            }
            let gap = bars[i].open / prev_close - 1.0;
            if gap > self.threshold {
                gap_up.push(i);
            } else if gap < -self.threshold {
                gap_down.push(i);
            }
        }
        let mut situations = Vec::new();
        if !gap_up.is_empty() {
            let mut s = situation(self, data, "Gap up > 2%", SignalKind::Momentum, gap_up, 0.35);
            s.id = "gap_up".to_string();
            situations.push(s);
        }
        if !gap_down.is_empty() {
            let mut s =
                situation(self, data, "Gap down > 2%", SignalKind::Momentum, gap_down, 0.35);
            s.id = "gap_down".to_string();
            situations.push(s);
        }
        Ok(situations)
    }
}

/// First trading day of each month (turn-of-month regularity).
#[derive(Debug, Clone, Default)]
pub struct TurnOfMonth;

impl PatternDetector for TurnOfMonth {
    fn id(&self) -> &'static str {
        "turn_of_month"
    }

    fn priority(&self) -> PatternPriority {
        PatternPriority::Secondary
    }

    fn detect(&self, data: &MarketData) -> Result<Vec<Situation>, EngineError> {
        let bars = data.history().bars();
        let mut indices = Vec::new();
        for i in 1..bars.len() {
            if bars[i].date.month() != bars[i - 1].date.month() {
                indices.push(i);
            }
        }
        if indices.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![situation(
            self,
            data,
            "First trading day of month",
            SignalKind::Calendar,
            indices,
            0.2,
        )])
    }
}
