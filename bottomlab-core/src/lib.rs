//! bottomlab core engine
//!
//! Pure analytics for the position-trading signal pipeline: price history and
//! derived series, pattern detection, multi-horizon outcome statistics with
//! robustness adjustments, pattern evaluation, the market-context gate, and
//! per-instrument screening. No I/O and no global state; everything here is a
//! deterministic function of its inputs.

pub mod context;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod indicators;
pub mod market_data;
pub mod patterns;
pub mod screener;
pub mod stats;
