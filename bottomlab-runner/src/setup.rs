//! Final output records.
//!
//! `Setup` is self-contained and serializes independently of any market
//! data. Every instrument that does not survive produces exactly one
//! `Rejection`; nothing is silently dropped.

use serde::{Deserialize, Serialize};

use bottomlab_core::stats::WilsonInterval;

/// Pipeline stage at which an instrument was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStage {
    Data,
    Context,
    Pattern,
    Evaluation,
    Trend,
    Cost,
    SectorCap,
    MinPosition,
    Rank,
    Timeout,
}

impl RejectionStage {
    pub fn label(self) -> &'static str {
        match self {
            RejectionStage::Data => "data",
            RejectionStage::Context => "context",
            RejectionStage::Pattern => "pattern",
            RejectionStage::Evaluation => "evaluation",
            RejectionStage::Trend => "trend",
            RejectionStage::Cost => "cost",
            RejectionStage::SectorCap => "sector_cap",
            RejectionStage::MinPosition => "min_position",
            RejectionStage::Rank => "rank",
            RejectionStage::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub ticker: String,
    pub stage: RejectionStage,
    /// Stable machine-readable code, e.g. `net_edge_below_floor`.
    pub reason_code: String,
    pub detail: String,
}

impl Rejection {
    pub fn new(
        ticker: impl Into<String>,
        stage: RejectionStage,
        reason_code: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            stage,
            reason_code: reason_code.into(),
            detail: detail.into(),
        }
    }
}

/// Forward edge per horizon, as reported to humans.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HorizonEdges {
    pub h21: f64,
    pub h42: f64,
    pub h63: f64,
}

/// A ranked trade candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setup {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub pattern_name: String,
    pub tier: String,
    pub score: f64,
    pub robust_score: f64,
    pub horizon_edges: HorizonEdges,
    pub win_rate: f64,
    pub win_rate_ci: WilsonInterval,
    pub expected_value: f64,
    /// 999.0 sentinel marks a degenerate no-loss sample.
    pub risk_reward: f64,
    pub sample_size: usize,
    /// 1.5x the average historical loss at the evaluation horizon.
    pub stop_loss_pct: f64,
    /// Final allocation, fraction of portfolio.
    pub position_pct: f64,
    /// Final allocation in account currency.
    pub position_currency: f64,
    /// Cost-adjusted edge that survived the net-edge floor.
    pub net_edge: f64,
    /// Human-readable diagnostics: penalties, haircuts, truncations.
    pub notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottomlab_core::stats::wilson_interval;

    #[test]
    fn setup_serializes_standalone() {
        let setup = Setup {
            ticker: "SINCH.ST".into(),
            name: "Sinch".into(),
            sector: "Technology".into(),
            pattern_name: "Double bottom after decline (W-pattern)".into(),
            tier: "CORE".into(),
            score: 71.5,
            robust_score: 63.0,
            horizon_edges: HorizonEdges { h21: 0.03, h42: 0.05, h63: 0.08 },
            win_rate: 0.67,
            win_rate_ci: wilson_interval(100, 150),
            expected_value: 0.045,
            risk_reward: 3.4,
            sample_size: 150,
            stop_loss_pct: 0.045,
            position_pct: 0.021,
            position_currency: 2_100.0,
            net_edge: 0.041,
            notes: vec!["trend haircut 30%".into()],
        };
        let json = serde_json::to_string(&setup).unwrap();
        let back: Setup = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ticker, "SINCH.ST");
        assert_eq!(back.notes.len(), 1);
        assert_eq!(back.win_rate_ci.sample_size, 150);
    }

    #[test]
    fn rejection_stage_labels_are_stable() {
        assert_eq!(RejectionStage::Context.label(), "context");
        assert_eq!(RejectionStage::MinPosition.label(), "min_position");
        let r = Rejection::new("X.ST", RejectionStage::Cost, "net_edge_below_floor", "0.1% < 0.3%");
        assert_eq!(
            serde_json::to_value(&r).unwrap()["stage"],
            serde_json::json!("cost")
        );
    }
}
