//! Engine error kinds.
//!
//! Recoverable kinds (data, indicator, detection, evaluation, timeout) are
//! converted to `Rejection` records by the pipeline and never abort a run.
//! `Config` and `InternalInvariant` are fatal and propagate to the
//! orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing/corrupt bars, too-short history, non-monotonic timestamps.
    #[error("data error for {ticker}: {reason}")]
    Data { ticker: String, reason: String },

    /// Degenerate indicator window (e.g. flat prices, std = 0).
    #[error("indicator error: {0}")]
    Indicator(String),

    /// A detector violated its own invariant; it contributes no situations.
    #[error("detection error in {detector}: {reason}")]
    Detection { detector: String, reason: String },

    /// Permutation sampler or evaluator produced a degenerate distribution.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Invalid configuration. Fatal; fails fast before any work.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cooperative cancellation was requested.
    #[error("cancellation requested")]
    Cancelled,

    /// Per-instrument wall-clock budget exceeded.
    #[error("instrument {ticker} exceeded {budget_secs}s budget")]
    Timeout { ticker: String, budget_secs: u64 },

    /// Unreachable state. Fatal, surfaces with diagnostic context.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl EngineError {
    pub fn data(ticker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Data { ticker: ticker.into(), reason: reason.into() }
    }

    /// Recoverable errors become `Rejection` records; fatal ones abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InternalInvariant(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_fatal() {
        assert!(EngineError::Config("bad horizon".into()).is_fatal());
        assert!(EngineError::InternalInvariant("oops".into()).is_fatal());
    }

    #[test]
    fn per_instrument_errors_are_recoverable() {
        assert!(!EngineError::data("SINC.ST", "gap in history").is_fatal());
        assert!(!EngineError::Timeout { ticker: "SINC.ST".into(), budget_secs: 30 }.is_fatal());
        assert!(!EngineError::Cancelled.is_fatal());
    }
}
