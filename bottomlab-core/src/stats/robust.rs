//! Robust statistics — small-sample corrections for pattern outcomes.
//!
//! A 3-for-3 pattern is not a 100% win rate; it is two coin flips of
//! information. This module applies Laplace smoothing, sample-size penalties,
//! consistency metrics, a significance test, and a pessimistic expected
//! value, then folds them into bounded 0-100 scores.

use serde::{Deserialize, Serialize};

use super::outcome::OutcomeStatistics;
use super::ttest::one_sided_t_test;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobustStatistics {
    pub sample_size: usize,
    pub raw_win_rate: f64,
    /// Laplace-smoothed win rate: (w + 1) / (n + 2), a Beta(1,1) prior.
    pub adjusted_win_rate: f64,
    /// Penalty factor in [0, 1]; 1.0 from n = 30 upward.
    pub sample_size_factor: f64,
    /// mean / std of the return sample, 0 when std is 0.
    pub return_consistency: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    /// One-sided p < 0.05.
    pub is_significant: bool,
    /// EV with the loss side weighted half toward the worst observed loss.
    /// Deliberately not floored at zero.
    pub pessimistic_ev: f64,
    /// 0-100 composite of sample size, consistency, significance, win rate.
    pub confidence_score: f64,
    /// 0-100 headline score combining confidence, pessimistic EV,
    /// consistency, and significance.
    pub robust_score: f64,
}

impl RobustStatistics {
    /// Compute from the forward-return sample at the evaluation horizon.
    pub fn from_returns(returns: &[f64]) -> Self {
        if returns.is_empty() {
            return Self::zeroed();
        }

        let outcome = OutcomeStatistics::from_returns(returns);
        let n = outcome.n;
        let wins = returns.iter().filter(|&&r| r > 0.0).count();

        let raw_win_rate = wins as f64 / n as f64;
        let adjusted_win_rate = (wins as f64 + 1.0) / (n as f64 + 2.0);
        let sample_size_factor = sample_size_factor(n);

        let return_consistency = if outcome.std > 0.0 { outcome.mean / outcome.std } else { 0.0 };

        let (t_statistic, p_value) = match one_sided_t_test(returns) {
            Some(t) => (t.t_statistic, t.p_value),
            None => (0.0, 1.0),
        };
        let is_significant = p_value < 0.05;

        let weighted_loss = 0.5 * outcome.avg_loss.abs() + 0.5 * outcome.worst_loss.abs();
        let pessimistic_ev =
            adjusted_win_rate * outcome.avg_win - (1.0 - adjusted_win_rate) * weighted_loss;

        let consistency_term = (return_consistency / 3.0).clamp(0.0, 1.0);
        let significance_term = if is_significant {
            1.0
        } else if p_value < 0.10 {
            0.5
        } else {
            0.0
        };
        let win_rate_term = (adjusted_win_rate / 0.7).min(1.0);

        let confidence_score = (40.0 * sample_size_factor
            + 30.0 * consistency_term
            + 20.0 * significance_term
            + 10.0 * win_rate_term)
            .clamp(0.0, 100.0);

        let ev_term = (pessimistic_ev / 0.10).clamp(0.0, 1.0);
        let robust_score = (0.40 * confidence_score
            + 0.30 * ev_term * 100.0
            + 0.20 * consistency_term * 100.0
            + 0.10 * if is_significant { 100.0 } else { 50.0 })
        .clamp(0.0, 100.0);

        Self {
            sample_size: n,
            raw_win_rate,
            adjusted_win_rate,
            sample_size_factor,
            return_consistency,
            t_statistic,
            p_value,
            is_significant,
            pessimistic_ev,
            confidence_score,
            robust_score,
        }
    }

    pub fn zeroed() -> Self {
        Self {
            sample_size: 0,
            raw_win_rate: 0.0,
            adjusted_win_rate: 0.0,
            sample_size_factor: 0.0,
            return_consistency: 0.0,
            t_statistic: 0.0,
            p_value: 1.0,
            is_significant: false,
            pessimistic_ev: 0.0,
            confidence_score: 0.0,
            robust_score: 0.0,
        }
    }
}

/// Sample-size penalty:
/// n < 5 → 0.20, [5, 15) → 0.20..0.60 linear, [15, 30) → 0.60..1.00 linear,
/// n >= 30 → 1.00.
pub fn sample_size_factor(n: usize) -> f64 {
    let n = n as f64;
    if n < 5.0 {
        0.20
    } else if n < 15.0 {
        0.20 + 0.40 * (n - 5.0) / 10.0
    } else if n < 30.0 {
        0.60 + 0.40 * (n - 15.0) / 15.0
    } else {
        1.00
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_win_small_sample_smoothing() {
        // One +15% trade: raw 100%, smoothed to 2/3, heavy size penalty
        let stats = RobustStatistics::from_returns(&[0.15]);
        assert!((stats.raw_win_rate - 1.0).abs() < 1e-12);
        assert!((stats.adjusted_win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.sample_size_factor - 0.20).abs() < 1e-12);
        assert!(!stats.is_significant);
    }

    #[test]
    fn large_sample_smoothing() {
        // n=200, w=150: adjusted = 151/202, full size factor
        let returns: Vec<f64> = (0..200)
            .map(|i| if i < 150 { 0.05 + (i % 7) as f64 * 0.001 } else { -0.02 - (i % 5) as f64 * 0.001 })
            .collect();
        let stats = RobustStatistics::from_returns(&returns);
        assert!((stats.adjusted_win_rate - 151.0 / 202.0).abs() < 1e-9);
        assert!((stats.sample_size_factor - 1.0).abs() < 1e-12);
        assert!(stats.is_significant);
    }

    #[test]
    fn sample_size_factor_breakpoints() {
        assert!((sample_size_factor(3) - 0.20).abs() < 1e-12);
        assert!((sample_size_factor(5) - 0.20).abs() < 1e-12);
        assert!((sample_size_factor(10) - 0.40).abs() < 1e-12);
        assert!((sample_size_factor(15) - 0.60).abs() < 1e-12);
        assert!((sample_size_factor(20) - 0.7333333333333333).abs() < 1e-9);
        assert!((sample_size_factor(30) - 1.0).abs() < 1e-12);
        assert!((sample_size_factor(500) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pessimistic_ev_worked_example() {
        // adjusted_wr 0.70, avg_win 0.10, avg_loss -0.03, worst -0.08:
        // 0.70*0.10 - 0.30*(0.5*0.03 + 0.5*0.08) = 0.0535
        // Sample engineered to produce exactly those aggregates:
        // 14 wins of +0.10, 5 losses of -0.0175, 1 loss of -0.08
        // → n=20, w=14, adjusted = 15/22 ≈ 0.682 (close but not exact),
        // so check the formula directly instead.
        let awr: f64 = 0.70;
        let ev = awr * 0.10 - (1.0 - awr) * (0.5 * 0.03 + 0.5 * 0.08);
        assert!((ev - 0.0535).abs() < 1e-12);
    }

    #[test]
    fn pessimistic_ev_is_not_floored() {
        // All losses: EV must go negative
        let stats = RobustStatistics::from_returns(&[-0.05, -0.10, -0.02, -0.08]);
        assert!(stats.pessimistic_ev < 0.0);
    }

    #[test]
    fn scores_are_bounded() {
        let cases: Vec<Vec<f64>> = vec![
            vec![0.15],
            vec![-0.5, -0.4, -0.3],
            (0..100).map(|i| if i % 3 == 0 { -0.02 } else { 0.08 }).collect(),
            vec![0.0, 0.0, 0.0],
        ];
        for returns in cases {
            let stats = RobustStatistics::from_returns(&returns);
            assert!((0.0..=100.0).contains(&stats.confidence_score));
            assert!((0.0..=100.0).contains(&stats.robust_score));
            assert!(stats.adjusted_win_rate > 0.0 && stats.adjusted_win_rate < 1.0);
        }
    }

    #[test]
    fn empty_sample_zeroes_everything() {
        let stats = RobustStatistics::from_returns(&[]);
        assert_eq!(stats.sample_size, 0);
        assert_eq!(stats.robust_score, 0.0);
        assert_eq!(stats.confidence_score, 0.0);
    }

    #[test]
    fn adjusted_approaches_raw_as_n_grows() {
        let small: Vec<f64> = (0..10).map(|i| if i < 7 { 0.05 } else { -0.05 }).collect();
        let large: Vec<f64> = (0..1000).map(|i| if i < 700 { 0.05 } else { -0.05 }).collect();
        let s = RobustStatistics::from_returns(&small);
        let l = RobustStatistics::from_returns(&large);
        assert!((l.adjusted_win_rate - 0.7).abs() < (s.adjusted_win_rate - 0.7).abs());
    }
}
