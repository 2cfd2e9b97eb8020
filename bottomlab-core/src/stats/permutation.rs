//! Sign-flip permutation test.
//!
//! Validates a pattern's mean return against randomness: flip the sign of
//! each return at random many times and ask whether the observed mean beats
//! the 95th percentile of the shuffled means. Seeded explicitly so results
//! are reproducible regardless of scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::outcome::percentile;
use crate::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutationOutcome {
    pub observed_mean: f64,
    /// 95th percentile of the permuted-mean distribution.
    pub threshold: f64,
    /// Share of permuted means at or above the observed mean.
    pub p_value: f64,
    pub passes: bool,
    pub n_permutations: usize,
}

/// Run the sign-flip test.
///
/// A degenerate sample (all zeros) cannot be distinguished from noise and is
/// reported as an `Evaluation` error; callers treat the pattern as not
/// significant.
pub fn sign_flip_permutation_test(
    returns: &[f64],
    n_permutations: usize,
    seed: u64,
) -> Result<PermutationOutcome, EngineError> {
    if returns.is_empty() || n_permutations == 0 {
        return Err(EngineError::Evaluation(
            "permutation test on empty sample".to_string(),
        ));
    }
    if returns.iter().all(|r| *r == 0.0) {
        return Err(EngineError::Evaluation(
            "permutation sampler produced a degenerate distribution".to_string(),
        ));
    }

    let n = returns.len() as f64;
    let observed_mean = returns.iter().sum::<f64>() / n;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut permuted_means = Vec::with_capacity(n_permutations);
    for _ in 0..n_permutations {
        let mut sum = 0.0;
        for &r in returns {
            sum += if rng.gen::<bool>() { r } else { -r };
        }
        permuted_means.push(sum / n);
    }

    let threshold = percentile(&permuted_means, 0.95);
    let at_or_above = permuted_means.iter().filter(|&&m| m >= observed_mean).count();
    let p_value = at_or_above as f64 / n_permutations as f64;

    Ok(PermutationOutcome {
        observed_mean,
        threshold,
        p_value,
        passes: observed_mean > threshold,
        n_permutations,
    })
}
