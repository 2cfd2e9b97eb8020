//! Wilson score interval for binomial proportions.
//!
//! Preferred over the normal approximation: behaves at small n and never
//! produces bounds outside [0, 1].

use serde::{Deserialize, Serialize};

/// 95% z-score; the engine grades everything at one confidence level.
const Z_95: f64 = 1.96;

/// Confidence interval for a win rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WilsonInterval {
    pub point_estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin: f64,
    pub sample_size: usize,
}

impl WilsonInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Wilson 95% score interval for `wins` successes in `trials`.
pub fn wilson_interval(wins: usize, trials: usize) -> WilsonInterval {
    if trials == 0 {
        return WilsonInterval {
            point_estimate: 0.0,
            lower: 0.0,
            upper: 0.0,
            margin: 0.0,
            sample_size: 0,
        };
    }

    let n = trials as f64;
    let p_hat = wins as f64 / n;
    let z2 = Z_95 * Z_95;

    let denominator = 1.0 + z2 / n;
    let centre = (p_hat + z2 / (2.0 * n)) / denominator;
    let margin =
        Z_95 * ((p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt()) / denominator;

    let lower = (centre - margin).max(0.0);
    let upper = (centre + margin).min(1.0);

    WilsonInterval {
        point_estimate: p_hat,
        lower,
        upper,
        // margin reported from the point estimate, the ± a human reads
        margin: (p_hat - lower).max(upper - p_hat),
        sample_size: trials,
    }
}
