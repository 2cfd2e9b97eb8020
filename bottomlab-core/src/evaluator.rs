//! Pattern evaluation: tiering and quality gates.
//!
//! Takes each detected situation, measures its forward outcomes at every
//! horizon, computes robust statistics on the 63-bar evaluation horizon, and
//! applies the gate battery: positive expected value, risk/reward floor,
//! sign-flip permutation test, and first/second-half regime stability.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::market_data::MarketData;
use crate::patterns::{PatternPriority, Situation};
use crate::stats::{
    forward_returns, sign_flip_permutation_test, Horizon, OutcomeStatistics, PermutationOutcome,
    RobustStatistics, HORIZONS,
};

/// Reported in place of a ratio when a pattern has no observed losses.
/// Propagated to reports unmodified so a human can verify the degenerate
/// sample.
pub const RISK_REWARD_SENTINEL: f64 = 999.0;

/// Sample-size quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Insufficient,
    Secondary,
    Primary,
    Core,
}

impl Tier {
    /// Rank for sorting; higher is better.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Core => 3,
            Tier::Primary => 2,
            Tier::Secondary => 1,
            Tier::Insufficient => 0,
        }
    }

    /// Score bonus contributed in the screener composite.
    pub fn bonus(self) -> f64 {
        match self {
            Tier::Core => 10.0,
            Tier::Primary => 7.0,
            Tier::Secondary => 3.0,
            Tier::Insufficient => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Core => "CORE",
            Tier::Primary => "PRIMARY",
            Tier::Secondary => "SECONDARY",
            Tier::Insufficient => "INSUFFICIENT",
        }
    }
}

/// Outcome of the quality-gate battery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub ev_positive: bool,
    pub risk_reward_ok: bool,
    pub permutation_ok: bool,
    pub regime_stable: bool,
    pub permutation: Option<PermutationOutcome>,
}

impl GateReport {
    pub fn all_pass(&self) -> bool {
        self.ev_positive && self.risk_reward_ok && self.permutation_ok && self.regime_stable
    }
}

/// A situation with its measured outcomes, tier, and gate results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatedPattern {
    pub situation: Situation,
    /// Keyed by horizon length in bars.
    pub stats_by_horizon: BTreeMap<usize, OutcomeStatistics>,
    pub robust: RobustStatistics,
    pub tier: Tier,
    /// win_rate * avg_win - (1 - win_rate) * |avg_loss| at the evaluation
    /// horizon.
    pub expected_value: f64,
    /// avg_win / |avg_loss|, or the 999 sentinel with no losses.
    pub risk_reward_ratio: f64,
    pub gates: GateReport,
}

impl EvaluatedPattern {
    /// Whether this pattern may be considered at all: a real tier and every
    /// quality gate passed.
    pub fn survives(&self) -> bool {
        self.tier != Tier::Insufficient && self.gates.all_pass()
    }

    pub fn stats_at(&self, horizon: Horizon) -> Option<&OutcomeStatistics> {
        self.stats_by_horizon.get(&horizon.bars())
    }
}

/// Evaluator configuration and entry point.
#[derive(Debug, Clone)]
pub struct PatternEvaluator {
    pub horizons: Vec<Horizon>,
    pub evaluation_horizon: Horizon,
    pub core_min_n: usize,
    pub primary_min_n: usize,
    pub secondary_min_n: usize,
    pub ev_floor: f64,
    pub rrr_floor: f64,
    pub n_permutations: usize,
}

impl Default for PatternEvaluator {
    fn default() -> Self {
        Self {
            horizons: HORIZONS.to_vec(),
            evaluation_horizon: Horizon(63),
            core_min_n: 150,
            primary_min_n: 75,
            secondary_min_n: 30,
            ev_floor: 0.0,
            rrr_floor: 3.0,
            n_permutations: 1000,
        }
    }
}

impl PatternEvaluator {
    /// Evaluate one situation. `seed` comes from the per-ticker seed
    /// hierarchy so permutation draws are reproducible.
    pub fn evaluate(
        &self,
        data: &MarketData,
        situation: Situation,
        seed: u64,
    ) -> EvaluatedPattern {
        let closes = data.closes();

        let mut stats_by_horizon = BTreeMap::new();
        for &horizon in &self.horizons {
            let sample = forward_returns(&closes, &situation.indices, horizon);
            stats_by_horizon.insert(horizon.bars(), OutcomeStatistics::from_returns(&sample));
        }

        let eval_sample = forward_returns(&closes, &situation.indices, self.evaluation_horizon);
        let robust = RobustStatistics::from_returns(&eval_sample);
        let eval_stats = stats_by_horizon
            .get(&self.evaluation_horizon.bars())
            .cloned()
            .unwrap_or_else(OutcomeStatistics::empty);

        let tier = self.tier_for(eval_stats.n, situation.priority);

        let expected_value = eval_stats.win_rate * eval_stats.avg_win
            - (1.0 - eval_stats.win_rate) * eval_stats.avg_loss.abs();

        let risk_reward_ratio = if eval_stats.avg_loss == 0.0 {
            RISK_REWARD_SENTINEL
        } else {
            eval_stats.avg_win / eval_stats.avg_loss.abs()
        };

        let gates = if tier == Tier::Insufficient {
            // Not worth the permutation budget; the pattern is already out
            GateReport {
                ev_positive: false,
                risk_reward_ok: false,
                permutation_ok: false,
                regime_stable: false,
                permutation: None,
            }
        } else {
            let permutation =
                sign_flip_permutation_test(&eval_sample, self.n_permutations, seed).ok();
            let permutation_ok = permutation.as_ref().is_some_and(|p| p.passes);
            GateReport {
                ev_positive: expected_value > self.ev_floor,
                risk_reward_ok: risk_reward_ratio >= self.rrr_floor,
                permutation_ok,
                regime_stable: halves_are_stable(&eval_sample),
                permutation,
            }
        };

        EvaluatedPattern {
            situation,
            stats_by_horizon,
            robust,
            tier,
            expected_value,
            risk_reward_ratio,
            gates,
        }
    }

    fn tier_for(&self, n: usize, priority: PatternPriority) -> Tier {
        match priority {
            PatternPriority::Primary => {
                if n >= self.core_min_n {
                    Tier::Core
                } else if n >= self.primary_min_n {
                    Tier::Primary
                } else if n >= self.secondary_min_n {
                    Tier::Secondary
                } else {
                    Tier::Insufficient
                }
            }
            // Supporting evidence is capped at SECONDARY however large n gets
            PatternPriority::Secondary => {
                if n >= self.secondary_min_n {
                    Tier::Secondary
                } else {
                    Tier::Insufficient
                }
            }
        }
    }
}

/// Regime stability: split the fire-ordered sample into halves; the worse
/// half's win rate must hold at least half the overall win rate.
fn halves_are_stable(returns: &[f64]) -> bool {
    if returns.len() < 2 {
        return false;
    }
    let overall = win_rate(returns);
    if overall == 0.0 {
        return false;
    }
    let mid = returns.len() / 2;
    let first = win_rate(&returns[..mid]);
    let second = win_rate(&returns[mid..]);
    first.min(second) >= 0.5 * overall
}

fn win_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}
