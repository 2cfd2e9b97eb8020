//! Per-horizon outcome statistics.
//!
//! Describes the empirical forward-return distribution after a situation.
//! These are historical measurements, not forecasts.

use serde::{Deserialize, Serialize};

use super::wilson::{wilson_interval, WilsonInterval};

/// Distribution statistics of one situation's forward returns at one horizon.
///
/// Every field is 0 when the sample is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeStatistics {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (n-1).
    pub std: f64,
    pub win_rate: f64,
    /// Mean of positive returns, 0 if none.
    pub avg_win: f64,
    /// Mean of negative returns (a negative number), 0 if none.
    pub avg_loss: f64,
    /// mean / std, 0 when std is 0.
    pub sharpe_like: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0).
    pub kurtosis: f64,
    /// Worst peak-to-trough of the compounded fire-ordered return sequence.
    pub worst_drawdown_proxy: f64,
    /// Minimum observed return; 0 when the sample has no negatives.
    pub worst_loss: f64,
    /// Gross wins / gross losses; 0 on empty, f64::INFINITY with no losses.
    pub profit_factor: f64,
    pub percentile_5: f64,
    pub percentile_25: f64,
    pub percentile_75: f64,
    pub percentile_95: f64,
    pub win_rate_ci: WilsonInterval,
}

impl OutcomeStatistics {
    pub fn from_returns(returns: &[f64]) -> Self {
        if returns.is_empty() {
            return Self::empty();
        }

        let n = returns.len();
        let n_f = n as f64;
        let mean = returns.iter().sum::<f64>() / n_f;

        let std = if n > 1 {
            (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n_f - 1.0)).sqrt()
        } else {
            0.0
        };

        let wins: Vec<f64> = returns.iter().copied().filter(|&r| r > 0.0).collect();
        let losses: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

        let win_count = wins.len();
        let win_rate = win_count as f64 / n_f;
        let avg_win = if wins.is_empty() { 0.0 } else { wins.iter().sum::<f64>() / wins.len() as f64 };
        let avg_loss =
            if losses.is_empty() { 0.0 } else { losses.iter().sum::<f64>() / losses.len() as f64 };

        let gross_wins: f64 = wins.iter().sum();
        let gross_losses: f64 = losses.iter().map(|l| l.abs()).sum();
        let profit_factor = if gross_losses > 0.0 { gross_wins / gross_losses } else { f64::INFINITY };

        let sharpe_like = if std > 0.0 { mean / std } else { 0.0 };

        // Central moments for shape; population moments like the usual
        // scientific-stack defaults
        let m2 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n_f;
        let m3 = returns.iter().map(|r| (r - mean).powi(3)).sum::<f64>() / n_f;
        let m4 = returns.iter().map(|r| (r - mean).powi(4)).sum::<f64>() / n_f;
        let (skewness, kurtosis) = if m2 > 0.0 {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let worst_loss = losses.iter().copied().fold(0.0_f64, f64::min);

        Self {
            n,
            mean,
            median: percentile(returns, 0.5),
            std,
            win_rate,
            avg_win,
            avg_loss,
            sharpe_like,
            skewness,
            kurtosis,
            worst_drawdown_proxy: max_drawdown(returns),
            worst_loss,
            profit_factor,
            percentile_5: percentile(returns, 0.05),
            percentile_25: percentile(returns, 0.25),
            percentile_75: percentile(returns, 0.75),
            percentile_95: percentile(returns, 0.95),
            win_rate_ci: wilson_interval(win_count, n),
        }
    }

    pub fn empty() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            median: 0.0,
            std: 0.0,
            win_rate: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            sharpe_like: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            worst_drawdown_proxy: 0.0,
            worst_loss: 0.0,
            profit_factor: 0.0,
            percentile_5: 0.0,
            percentile_25: 0.0,
            percentile_75: 0.0,
            percentile_95: 0.0,
            win_rate_ci: wilson_interval(0, 0),
        }
    }
}

/// Linear-interpolation percentile (q in [0, 1]) of an unsorted slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// Worst drawdown of the compounded return sequence, in fire order.
/// A proxy: fires are not a continuous equity curve, but the number flags
/// clustered losing streaks that a mean hides.
fn max_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for r in returns {
        equity *= 1.0 + r;
        peak = peak.max(equity);
        if peak > 0.0 {
            worst = worst.min((equity - peak) / peak);
        }
    }
    worst
}
