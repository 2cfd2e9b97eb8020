//! Outcome statistics with robustness adjustments.
//!
//! The Y-side of the pipeline: what historically happened after each
//! situation, measured at 21/42/63-bar horizons, with small-sample
//! corrections that keep the numbers honest.

pub mod forward;
pub mod outcome;
pub mod permutation;
pub mod robust;
pub mod ttest;
pub mod wilson;

pub use forward::{forward_returns, Horizon, HORIZONS};
pub use outcome::OutcomeStatistics;
pub use permutation::{sign_flip_permutation_test, PermutationOutcome};
pub use robust::RobustStatistics;
pub use ttest::{one_sided_t_test, t_cdf, TTest};
pub use wilson::{wilson_interval, WilsonInterval};
