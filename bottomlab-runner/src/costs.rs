//! Execution cost model.
//!
//! A green pattern with 0.8% edge in an instrument costing 1.0% round-trip
//! is a losing trade. Total round-trip cost = FX + courtage + spread +
//! slippage, each expressed as a fraction of the position.

use serde::{Deserialize, Serialize};

use bottomlab_core::domain::{Instrument, LiquidityTier};

use crate::config::{CourtageTier, FxCosts};
use crate::regime::VolatilityRegime;

/// Base one-way slippage before the volatility-regime multiplier.
const BASE_SLIPPAGE: f64 = 0.001;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub fx: f64,
    pub courtage: f64,
    pub spread: f64,
    pub slippage: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.fx + self.courtage + self.spread + self.slippage
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionCostModel {
    pub fx_costs: FxCosts,
    pub courtage_tier: CourtageTier,
}

impl ExecutionCostModel {
    pub fn new(fx_costs: FxCosts, courtage_tier: CourtageTier) -> Self {
        Self { fx_costs, courtage_tier }
    }

    /// Round-trip cost for a position of `notional` account-currency units.
    pub fn round_trip(
        &self,
        instrument: &Instrument,
        notional: f64,
        vol_regime: VolatilityRegime,
    ) -> CostBreakdown {
        let fx = self.fx_costs.for_geography(instrument.geography);

        let (min_fee, rate) = self.courtage_tier.fee_schedule();
        let courtage = if notional > 0.0 {
            // Per side, doubled for the round trip
            2.0 * (notional * rate).max(min_fee) / notional
        } else {
            0.0
        };

        let spread = match instrument.liquidity_tier {
            LiquidityTier::LargeCap => 0.0005,
            LiquidityTier::MidCap => 0.0015,
            LiquidityTier::SmallCap => 0.0030,
        };

        let slippage = BASE_SLIPPAGE * vol_regime.slippage_multiplier();

        CostBreakdown { fx, courtage, spread, slippage }
    }
}
