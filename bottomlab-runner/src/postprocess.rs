//! Post-processing: the risk layers between a score and a position.
//!
//! Fixed order, any step may reject: trend filter, volatility sizing,
//! execution-cost gate, regime multiplier. The sector cap and the
//! minimum-position floor run during ranked-set assembly (`ranker`), after
//! the cross-instrument picture exists.

use serde::{Deserialize, Serialize};

use bottomlab_core::domain::Instrument;
use bottomlab_core::evaluator::RISK_REWARD_SENTINEL;
use bottomlab_core::screener::PositionTradingScore;

use crate::config::EngineConfig;
use crate::costs::ExecutionCostModel;
use crate::regime::{RegimeAssessment, VolatilityRegime};
use crate::setup::{HorizonEdges, Rejection, RejectionStage, Setup};

/// Target per-position volatility for the V-Kelly factor.
const TARGET_VOLATILITY: f64 = 0.02;

/// Per-instrument measurements the post-processor needs beyond the score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendSnapshot {
    /// (close - EMA200) / EMA200 at the last bar; NaN if EMA200 unformed.
    pub distance_to_ema200: f64,
    /// ATR(14) / close at the last bar; NaN if unformed.
    pub atr_pct: f64,
    pub vol_regime: VolatilityRegime,
}

pub struct PostProcessor<'a> {
    pub config: &'a EngineConfig,
    pub cost_model: ExecutionCostModel,
}

impl<'a> PostProcessor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            config,
            cost_model: ExecutionCostModel::new(
                config.fx_cost_by_geography.clone(),
                config.courtage_tier,
            ),
        }
    }

    /// Run steps 1-4. The returned `Setup` still faces the sector cap and
    /// the minimum-position floor during assembly.
    pub fn process(
        &self,
        score: &PositionTradingScore,
        instrument: &Instrument,
        trend: TrendSnapshot,
        regime: &RegimeAssessment,
    ) -> Result<Setup, Rejection> {
        let ticker = &score.ticker;
        let mut alloc = score.raw_allocation;
        let mut notes: Vec<String> = score.penalties.iter().map(|p| p.label().to_string()).collect();

        // 1. Trend filter
        let distance = trend.distance_to_ema200;
        if distance.is_nan() {
            return Err(Rejection::new(
                ticker,
                RejectionStage::Data,
                "ema200_unformed",
                "history too short for the 200-bar trend filter",
            ));
        }
        if distance < -0.10 {
            return Err(Rejection::new(
                ticker,
                RejectionStage::Trend,
                "strong_downtrend",
                format!("price {:.1}% below EMA200", distance * 100.0),
            ));
        }
        if distance < 0.0 {
            alloc *= 0.7;
            notes.push(format!(
                "trend haircut 30% (price {:.1}% below EMA200)",
                distance * 100.0
            ));
        }

        // 2. V-Kelly volatility sizing
        if trend.atr_pct.is_finite() && trend.atr_pct > 0.0 {
            let volatility_factor = (TARGET_VOLATILITY / trend.atr_pct).clamp(0.0, 1.0);
            if volatility_factor < 1.0 {
                notes.push(format!(
                    "volatility sizing x{volatility_factor:.2} (ATR {:.1}%)",
                    trend.atr_pct * 100.0
                ));
            }
            alloc *= volatility_factor;
        } else {
            notes.push("ATR unavailable, volatility sizing skipped".to_string());
        }

        // 3. Execution cost gate
        let notional = alloc * self.config.portfolio_currency_amount;
        let costs = self.cost_model.round_trip(instrument, notional, trend.vol_regime);
        let net_edge = score.best.expected_value - costs.total();
        if net_edge < self.config.net_edge_floor {
            return Err(Rejection::new(
                ticker,
                RejectionStage::Cost,
                "net_edge_below_floor",
                format!(
                    "edge {:.3}% - costs {:.3}% = {:.3}% < floor {:.3}%",
                    score.best.expected_value * 100.0,
                    costs.total() * 100.0,
                    net_edge * 100.0,
                    self.config.net_edge_floor * 100.0
                ),
            ));
        }

        // 4. Regime multiplier
        let multiplier = regime.multiplier(instrument, &self.config.regime_multipliers);
        if multiplier < 1.0 {
            notes.push(format!("{} regime x{multiplier:.1}", regime.regime.label()));
        }
        alloc *= multiplier;

        let eval_stats = score
            .best
            .stats_by_horizon
            .get(&self.config.evaluation_horizon())
            .cloned()
            .unwrap_or_else(bottomlab_core::stats::OutcomeStatistics::empty);

        if score.best.risk_reward_ratio == RISK_REWARD_SENTINEL {
            notes.push("no historical losses in sample; risk/reward is the 999 sentinel".into());
        }

        Ok(Setup {
            ticker: score.ticker.clone(),
            name: score.name.clone(),
            sector: instrument.sector.clone(),
            pattern_name: score.best.situation.description.clone(),
            tier: score.best.tier.label().to_string(),
            score: score.score,
            robust_score: score.best.robust.robust_score,
            horizon_edges: HorizonEdges {
                h21: score.edge_21,
                h42: score.edge_42,
                h63: score.edge_63,
            },
            win_rate: score.win_rate_63,
            win_rate_ci: score.win_rate_ci,
            expected_value: score.best.expected_value,
            risk_reward: score.best.risk_reward_ratio,
            sample_size: score.sample_size,
            stop_loss_pct: 1.5 * eval_stats.avg_loss.abs(),
            position_pct: alloc,
            position_currency: alloc * self.config.portfolio_currency_amount,
            net_edge,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MacroSignals;
    use bottomlab_core::context::MarketContext;
    use bottomlab_core::domain::{EarningsRisk, Geography, LiquidityTier, MarketDataId};
    use bottomlab_core::evaluator::{EvaluatedPattern, GateReport, Tier};
    use bottomlab_core::patterns::{PatternPriority, SignalKind, Situation};
    use bottomlab_core::stats::{wilson_interval, OutcomeStatistics, RobustStatistics};
    use std::collections::BTreeMap;

    fn instrument() -> Instrument {
        Instrument {
            ticker: "TEST.ST".into(),
            name: "Test AB".into(),
            sector: "Industrials".into(),
            geography: Geography::Sweden,
            all_weather: false,
            liquidity_tier: LiquidityTier::LargeCap,
            earnings_risk: EarningsRisk::None,
        }
    }

    /// A surviving score with a healthy edge. Returns at the evaluation
    /// horizon average +8% with -3% losses.
    fn score(expected_value: f64) -> PositionTradingScore {
        let returns: Vec<f64> = (0..160)
            .map(|i| if i % 4 == 0 { -0.03 } else { 0.08 })
            .collect();
        let outcome = OutcomeStatistics::from_returns(&returns);
        let robust = RobustStatistics::from_returns(&returns);
        let mut stats_by_horizon = BTreeMap::new();
        for h in [21usize, 42, 63] {
            stats_by_horizon.insert(h, outcome.clone());
        }
        let best = EvaluatedPattern {
            situation: Situation {
                id: "double_bottom_after_decline".into(),
                description: "Double bottom after decline (W-pattern)".into(),
                market_data_id: MarketDataId("test".into()),
                indices: vec![10, 50, 90],
                confidence: 0.8,
                priority: PatternPriority::Primary,
                signal_kind: SignalKind::StructuralReversal,
                volume_confirmed: true,
                metadata: BTreeMap::new(),
            },
            stats_by_horizon,
            robust,
            tier: Tier::Core,
            expected_value,
            risk_reward_ratio: 8.0 / 3.0,
            gates: GateReport {
                ev_positive: true,
                risk_reward_ok: true,
                permutation_ok: true,
                regime_stable: true,
                permutation: None,
            },
        };
        PositionTradingScore {
            ticker: "TEST.ST".into(),
            name: "Test AB".into(),
            context: MarketContext {
                decline_from_high: -0.18,
                high_lookback: 90,
                context_valid: true,
            },
            secondary_context: 1,
            score: 75.0,
            edge_21: 0.03,
            edge_42: 0.05,
            edge_63: outcome.mean,
            win_rate_63: outcome.win_rate,
            win_rate_ci: wilson_interval(120, 160),
            sample_size: 160,
            volume_confirmed: true,
            earnings_risk: EarningsRisk::None,
            penalties: vec![],
            raw_allocation: 0.028,
            best,
        }
    }

    fn healthy_regime() -> RegimeAssessment {
        RegimeAssessment::from_breadth(70, 100, MacroSignals::default())
    }

    fn calm_trend() -> TrendSnapshot {
        TrendSnapshot {
            distance_to_ema200: 0.02,
            atr_pct: 0.02,
            vol_regime: VolatilityRegime::Stable,
        }
    }

    #[test]
    fn healthy_path_produces_setup() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let setup = processor
            .process(&score(0.05), &instrument(), calm_trend(), &healthy_regime())
            .unwrap();
        // ATR exactly at target: factor 1, no regime cut
        assert!((setup.position_pct - 0.028).abs() < 1e-12);
        assert!(setup.net_edge <= setup.expected_value);
        assert!(setup.net_edge >= config.net_edge_floor);
        assert!((setup.position_currency - 2_800.0).abs() < 1e-6);
    }

    #[test]
    fn strong_downtrend_rejects() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let trend = TrendSnapshot {
            distance_to_ema200: -0.15,
            ..calm_trend()
        };
        let rejection = processor
            .process(&score(0.05), &instrument(), trend, &healthy_regime())
            .unwrap_err();
        assert_eq!(rejection.stage, RejectionStage::Trend);
        assert_eq!(rejection.reason_code, "strong_downtrend");
    }

    #[test]
    fn mild_downtrend_haircuts_30pct() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let trend = TrendSnapshot {
            distance_to_ema200: -0.05,
            ..calm_trend()
        };
        let setup = processor
            .process(&score(0.05), &instrument(), trend, &healthy_regime())
            .unwrap();
        assert!((setup.position_pct - 0.028 * 0.7).abs() < 1e-12);
        assert!(setup.notes.iter().any(|n| n.contains("trend haircut")));
    }

    #[test]
    fn volatile_instrument_is_scaled_down() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let trend = TrendSnapshot {
            atr_pct: 0.04, // factor 0.5
            ..calm_trend()
        };
        let setup = processor
            .process(&score(0.05), &instrument(), trend, &healthy_regime())
            .unwrap();
        assert!((setup.position_pct - 0.014).abs() < 1e-12);
    }

    #[test]
    fn thin_edge_fails_cost_gate() {
        // Edge 0.4%, Swedish large cap stable costs ~0.18%: net ~0.22% < 0.3%
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let rejection = processor
            .process(&score(0.004), &instrument(), calm_trend(), &healthy_regime())
            .unwrap_err();
        assert_eq!(rejection.stage, RejectionStage::Cost);
        assert_eq!(rejection.reason_code, "net_edge_below_floor");
    }

    #[test]
    fn crisis_regime_scales_to_one_fifth() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let crisis = RegimeAssessment::from_breadth(5, 100, MacroSignals::default());
        let setup = processor
            .process(&score(0.05), &instrument(), calm_trend(), &crisis)
            .unwrap();
        assert!((setup.position_pct - 0.028 * 0.2).abs() < 1e-12);
        assert!(setup.notes.iter().any(|n| n.contains("CRISIS")));
    }

    #[test]
    fn net_edge_never_exceeds_expected_value() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let setup = processor
            .process(&score(0.05), &instrument(), calm_trend(), &healthy_regime())
            .unwrap();
        assert!(setup.net_edge <= setup.expected_value);
    }

    #[test]
    fn stop_loss_is_one_and_a_half_avg_loss() {
        let config = EngineConfig::default();
        let processor = PostProcessor::new(&config);
        let setup = processor
            .process(&score(0.05), &instrument(), calm_trend(), &healthy_regime())
            .unwrap();
        assert!((setup.stop_loss_pct - 0.045).abs() < 1e-12);
    }
}
