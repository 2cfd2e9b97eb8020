//! Instrument screening: context gate, detection, evaluation, best-pattern
//! selection, composite score, and initial allocation.

use serde::{Deserialize, Serialize};

use crate::context::{MarketContext, MarketContextFilter};
use crate::error::EngineError;
use crate::evaluator::{EvaluatedPattern, PatternEvaluator, Tier};
use crate::market_data::MarketData;
use crate::patterns::{DetectorRegistry, PatternPriority};
use crate::stats::WilsonInterval;
use crate::domain::{EarningsRisk, Instrument};

/// Why an instrument produced no score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScreenFailure {
    /// Context gate failed; the instrument sits too close to its high.
    ContextInvalid { decline_from_high: f64 },
    /// No detector fired at all.
    NoPatterns,
    /// Patterns fired but none survived tiering and the quality gates.
    NoQualifiedPattern { evaluated: usize },
}

/// Multiplicative penalty that fired during scoring; reported as a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorePenalty {
    EarningsHigh,
    EarningsWarning,
    VolumeUnconfirmed,
}

impl ScorePenalty {
    pub fn factor(self) -> f64 {
        match self {
            ScorePenalty::EarningsHigh => 0.5,
            ScorePenalty::EarningsWarning => 0.8,
            ScorePenalty::VolumeUnconfirmed => 0.9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScorePenalty::EarningsHigh => "earnings risk HIGH (score halved)",
            ScorePenalty::EarningsWarning => "earnings warning (score x0.8)",
            ScorePenalty::VolumeUnconfirmed => "volume not confirmed (score x0.9)",
        }
    }
}

/// The screener's verdict for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionTradingScore {
    pub ticker: String,
    pub name: String,
    pub context: MarketContext,
    pub best: EvaluatedPattern,
    /// Surviving SECONDARY-priority patterns, kept as supporting context.
    pub secondary_context: usize,
    /// Composite 0-100 score.
    pub score: f64,
    pub edge_21: f64,
    pub edge_42: f64,
    pub edge_63: f64,
    pub win_rate_63: f64,
    pub win_rate_ci: WilsonInterval,
    pub sample_size: usize,
    pub volume_confirmed: bool,
    pub earnings_risk: EarningsRisk,
    pub penalties: Vec<ScorePenalty>,
    /// Initial allocation before post-processing, fraction of portfolio.
    pub raw_allocation: f64,
}

pub struct InstrumentScreener {
    pub context_filter: MarketContextFilter,
    pub registry: DetectorRegistry,
    pub evaluator: PatternEvaluator,
}

impl InstrumentScreener {
    pub fn new(
        context_filter: MarketContextFilter,
        registry: DetectorRegistry,
        evaluator: PatternEvaluator,
    ) -> Self {
        Self { context_filter, registry, evaluator }
    }

    pub fn standard() -> Self {
        Self::new(
            MarketContextFilter::default(),
            DetectorRegistry::standard(),
            PatternEvaluator::default(),
        )
    }

    /// Screen one instrument. Detector errors are recoverable and returned
    /// alongside the verdict so the caller can log them.
    pub fn screen(
        &self,
        data: &MarketData,
        instrument: &Instrument,
        seed: u64,
    ) -> (Result<PositionTradingScore, ScreenFailure>, Vec<EngineError>) {
        let context = self.context_filter.check(data);
        if !context.context_valid {
            return (
                Err(ScreenFailure::ContextInvalid {
                    decline_from_high: context.decline_from_high,
                }),
                vec![],
            );
        }

        let (situations, errors) = self.registry.detect_all(data);
        if situations.is_empty() {
            return (Err(ScreenFailure::NoPatterns), errors);
        }

        let evaluated: Vec<EvaluatedPattern> = situations
            .into_iter()
            .map(|s| self.evaluator.evaluate(data, s, seed))
            .collect();
        let evaluated_count = evaluated.len();

        let secondary_context = evaluated
            .iter()
            .filter(|p| p.situation.priority == PatternPriority::Secondary && p.survives())
            .count();

        // Only structural PRIMARY patterns may drive a buy. Highest tier
        // first, then highest expected value inside the tier.
        let best = evaluated
            .into_iter()
            .filter(|p| p.situation.priority == PatternPriority::Primary && p.survives())
            .max_by(|a, b| {
                (a.tier.rank(), a.expected_value)
                    .partial_cmp(&(b.tier.rank(), b.expected_value))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let best = match best {
            Some(best) => best,
            None => {
                return (
                    Err(ScreenFailure::NoQualifiedPattern { evaluated: evaluated_count }),
                    errors,
                )
            }
        };

        let edge = |h: usize| {
            best.stats_by_horizon
                .get(&h)
                .map(|s| s.mean)
                .unwrap_or(0.0)
        };
        let eval_stats = best
            .stats_at(self.evaluator.evaluation_horizon)
            .cloned()
            .unwrap_or_else(crate::stats::OutcomeStatistics::empty);

        let volume_confirmed = best.situation.volume_confirmed;
        let (score, penalties) = composite_score(
            best.robust.robust_score,
            context.context_valid,
            best.tier,
            volume_confirmed,
            instrument.earnings_risk,
        );

        let raw_allocation = initial_allocation(eval_stats.win_rate);

        let score_record = PositionTradingScore {
            ticker: instrument.ticker.clone(),
            name: instrument.name.clone(),
            context,
            secondary_context,
            score,
            edge_21: edge(21),
            edge_42: edge(42),
            edge_63: edge(63),
            win_rate_63: eval_stats.win_rate,
            win_rate_ci: eval_stats.win_rate_ci,
            sample_size: eval_stats.n,
            volume_confirmed,
            earnings_risk: instrument.earnings_risk,
            penalties,
            raw_allocation,
            best,
        };

        (Ok(score_record), errors)
    }
}

/// Composite score: half the robust score, the context block, tier and volume
/// bonuses, then multiplicative penalties, clamped to [0, 100].
fn composite_score(
    robust_score: f64,
    context_valid: bool,
    tier: Tier,
    volume_confirmed: bool,
    earnings_risk: EarningsRisk,
) -> (f64, Vec<ScorePenalty>) {
    let mut score = 0.50 * robust_score
        + if context_valid { 30.0 } else { 0.0 }
        + tier.bonus()
        + if volume_confirmed { 3.0 } else { 0.0 };

    let mut penalties = Vec::new();
    match earnings_risk {
        EarningsRisk::High => penalties.push(ScorePenalty::EarningsHigh),
        EarningsRisk::Warning => penalties.push(ScorePenalty::EarningsWarning),
        EarningsRisk::None => {}
    }
    if !volume_confirmed {
        penalties.push(ScorePenalty::VolumeUnconfirmed);
    }
    for p in &penalties {
        score *= p.factor();
    }

    (score.clamp(0.0, 100.0), penalties)
}

/// Win-rate-based base allocation: 1.5% plus 0.375 percentage points per
/// win-rate point above 60%, clamped to [0.1%, 5%].
fn initial_allocation(win_rate: f64) -> f64 {
    let alloc = 0.015 + (win_rate - 0.60).max(0.0) * 0.0375;
    alloc.clamp(0.001, 0.05)
}
