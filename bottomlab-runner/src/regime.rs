//! Market regime model.
//!
//! When correlation goes to one, diversification stops protecting and
//! pattern statistics stop meaning anything. The regime is classified from
//! universe breadth (share of analysed instruments above their EMA200) and
//! downgraded by macro stress signals; it scales every allocation.

use serde::{Deserialize, Serialize};

use bottomlab_core::domain::Instrument;

use crate::config::{MacroSignals, RegimeMultipliers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarketRegime {
    Crisis,
    Stressed,
    Cautious,
    Healthy,
}

impl MarketRegime {
    /// Classify from breadth: > 50% HEALTHY, > 30% CAUTIOUS, > 10% STRESSED,
    /// else CRISIS. Each active macro signal downgrades one step.
    pub fn classify(breadth_pct: f64, macro_signals: MacroSignals) -> Self {
        let base = if breadth_pct > 50.0 {
            MarketRegime::Healthy
        } else if breadth_pct > 30.0 {
            MarketRegime::Cautious
        } else if breadth_pct > 10.0 {
            MarketRegime::Stressed
        } else {
            MarketRegime::Crisis
        };

        let downgrades = usize::from(macro_signals.yield_curve_inverted)
            + usize::from(macro_signals.credit_spread_widening);
        (0..downgrades).fold(base, |r, _| r.downgrade())
    }

    fn downgrade(self) -> Self {
        match self {
            MarketRegime::Healthy => MarketRegime::Cautious,
            MarketRegime::Cautious => MarketRegime::Stressed,
            MarketRegime::Stressed | MarketRegime::Crisis => MarketRegime::Crisis,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MarketRegime::Healthy => "HEALTHY",
            MarketRegime::Cautious => "CAUTIOUS",
            MarketRegime::Stressed => "STRESSED",
            MarketRegime::Crisis => "CRISIS",
        }
    }
}

/// Regime assessment for one run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    /// % of analysed instruments above their EMA200.
    pub breadth_pct: f64,
    /// 100 - breadth: how much of the universe is under water.
    pub stress_index: f64,
    pub macro_signals: MacroSignals,
}

impl RegimeAssessment {
    pub fn from_breadth(
        above_ema200: usize,
        measured: usize,
        macro_signals: MacroSignals,
    ) -> Self {
        // An unmeasurable universe is treated as maximum stress
        let breadth_pct = if measured == 0 {
            0.0
        } else {
            above_ema200 as f64 / measured as f64 * 100.0
        };
        Self {
            regime: MarketRegime::classify(breadth_pct, macro_signals),
            breadth_pct,
            stress_index: 100.0 - breadth_pct,
            macro_signals,
        }
    }

    /// Allocation multiplier for one instrument. All-weather instruments
    /// keep full size in CRISIS; defensive sectors keep half.
    pub fn multiplier(&self, instrument: &Instrument, table: &RegimeMultipliers) -> f64 {
        match self.regime {
            MarketRegime::Healthy => table.healthy,
            MarketRegime::Cautious => table.cautious,
            MarketRegime::Stressed => table.stressed,
            MarketRegime::Crisis => {
                if instrument.all_weather {
                    1.0
                } else if instrument.is_defensive_sector() {
                    0.5
                } else {
                    table.crisis
                }
            }
        }
    }
}

/// Slippage scaling by the instrument's own volatility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Contracting,
    Stable,
    Expanding,
    Explosive,
}

impl VolatilityRegime {
    /// Classify the current ATR% against the quartiles of its trailing-year
    /// distribution: below Q1 contracting, above Q3 expanding, above the
    /// 90th percentile explosive.
    pub fn classify(current_atr_pct: f64, trailing_atr_pct: &[f64]) -> Self {
        let clean: Vec<f64> =
            trailing_atr_pct.iter().copied().filter(|v| v.is_finite()).collect();
        if current_atr_pct.is_nan() || clean.len() < 20 {
            return VolatilityRegime::Stable;
        }
        let q25 = percentile_of(&clean, 0.25);
        let q75 = percentile_of(&clean, 0.75);
        let q90 = percentile_of(&clean, 0.90);
        if current_atr_pct > q90 {
            VolatilityRegime::Explosive
        } else if current_atr_pct > q75 {
            VolatilityRegime::Expanding
        } else if current_atr_pct < q25 {
            VolatilityRegime::Contracting
        } else {
            VolatilityRegime::Stable
        }
    }

    pub fn slippage_multiplier(self) -> f64 {
        match self {
            VolatilityRegime::Stable => 1.0,
            VolatilityRegime::Expanding => 2.0,
            VolatilityRegime::Explosive => 4.0,
            VolatilityRegime::Contracting => 0.5,
        }
    }
}

fn percentile_of(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
