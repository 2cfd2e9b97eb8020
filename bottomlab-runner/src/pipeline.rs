//! The run orchestrator.
//!
//! Instrument-level data parallelism on a rayon pool: each instrument's
//! analysis is pure and independent. Cross-instrument state (breadth →
//! regime, sector caps) is computed after the parallel phase, so the final
//! output is a deterministic function of (config, universe, data) regardless
//! of worker count.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bottomlab_core::context::MarketContextFilter;
use bottomlab_core::domain::Instrument;
use bottomlab_core::error::EngineError;
use bottomlab_core::evaluator::PatternEvaluator;
use bottomlab_core::market_data::{MarketData, SeriesKind};
use bottomlab_core::patterns::DetectorRegistry;
use bottomlab_core::screener::{InstrumentScreener, PositionTradingScore, ScreenFailure};
use bottomlab_core::stats::Horizon;

use crate::cache::IndicatorCache;
use crate::config::EngineConfig;
use crate::postprocess::{PostProcessor, TrendSnapshot};
use crate::ranker;
use crate::regime::{RegimeAssessment, VolatilityRegime};
use crate::rng::SeedHierarchy;
use crate::setup::{Rejection, RejectionStage, Setup};
use crate::source::PriceSource;
use crate::universe::Universe;

/// Context-gate diagnostic kept for every instrument with data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclineRecord {
    pub ticker: String,
    /// Fractional distance from the 90-bar high (negative below it).
    pub decline_from_high: f64,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub setups: Vec<Setup>,
    pub rejections: Vec<Rejection>,
    /// Instruments actually processed (not skipped by cancellation).
    pub analysed: usize,
    /// Instruments that reached pattern evaluation.
    pub evaluated: usize,
    pub regime: RegimeAssessment,
    /// True when cancellation stopped the run before the full universe.
    pub partial: bool,
    pub declines: Vec<DeclineRecord>,
}

/// Per-instrument result of the parallel phase.
struct Analysis {
    above_ema200: Option<bool>,
    decline: Option<DeclineRecord>,
    evaluated: bool,
    outcome: Result<(PositionTradingScore, TrendSnapshot), Rejection>,
}

pub struct Pipeline<'a> {
    config: &'a EngineConfig,
    universe: &'a Universe,
    as_of: NaiveDate,
    seeds: SeedHierarchy,
    indicator_cache: Option<&'a IndicatorCache>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a EngineConfig, universe: &'a Universe, as_of: NaiveDate) -> Self {
        let seeds = SeedHierarchy::new(config.master_seed);
        Self { config, universe, as_of, seeds, indicator_cache: None }
    }

    /// Reuse derived series across runs with the same as-of date.
    pub fn with_indicator_cache(mut self, cache: &'a IndicatorCache) -> Self {
        self.indicator_cache = Some(cache);
        self
    }

    /// Run the full pipeline. Only fatal errors propagate; everything
    /// per-instrument becomes a `Rejection`.
    pub fn run(
        &self,
        source: &dyn PriceSource,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome, EngineError> {
        if self.universe.is_empty() {
            return Err(EngineError::Config("universe is empty".into()));
        }

        let worker_count = self
            .config
            .worker_count
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .build()
            .map_err(|e| EngineError::InternalInvariant(format!("worker pool: {e}")))?;

        info!(
            instruments = self.universe.len(),
            workers = worker_count,
            as_of = %self.as_of,
            "starting scan"
        );

        // Parallel phase: fetch, screen, trend-measure each instrument.
        // Results collect in universe order, so downstream is order-stable.
        let analyses: Vec<Option<Analysis>> = pool.install(|| {
            self.universe
                .instruments()
                .par_iter()
                .map(|instrument| {
                    if cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    Some(self.analyse_instrument(source, instrument))
                })
                .collect()
        });

        let partial = analyses.iter().any(Option::is_none);
        if partial {
            info!("cancellation honored; ranking the completed subset");
        }

        let mut rejections = Vec::new();
        let mut survivors: Vec<(usize, PositionTradingScore, TrendSnapshot)> = Vec::new();
        let mut declines = Vec::new();
        let mut above = 0usize;
        let mut measured = 0usize;
        let mut analysed = 0usize;
        let mut evaluated = 0usize;

        for (index, analysis) in analyses.into_iter().enumerate() {
            let Some(analysis) = analysis else { continue };
            analysed += 1;
            if analysis.evaluated {
                evaluated += 1;
            }
            if let Some(flag) = analysis.above_ema200 {
                measured += 1;
                if flag {
                    above += 1;
                }
            }
            if let Some(decline) = analysis.decline {
                declines.push(decline);
            }
            match analysis.outcome {
                Ok((score, trend)) => survivors.push((index, score, trend)),
                Err(rejection) => rejections.push(rejection),
            }
        }

        // Breadth over the measured subset drives the regime for this run
        let regime = RegimeAssessment::from_breadth(above, measured, self.config.macro_signals);
        info!(
            regime = regime.regime.label(),
            breadth_pct = regime.breadth_pct,
            "market regime"
        );

        // Post-processing (trend, sizing, costs, regime) per survivor
        let processor = PostProcessor::new(self.config);
        let mut candidates: Vec<Setup> = Vec::new();
        for (index, score, trend) in survivors {
            let instrument = &self.universe.instruments()[index];
            match processor.process(&score, instrument, trend, &regime) {
                Ok(setup) => candidates.push(setup),
                Err(rejection) => rejections.push(rejection),
            }
        }

        // Ranked-set assembly: sector cap, minimum floor, top N
        let ranked = ranker::assemble(
            candidates,
            self.config.sector_cap,
            self.config.portfolio_currency_amount,
            self.config.min_position_currency,
            self.config.top_n,
        );
        rejections.extend(ranked.rejections);

        Ok(RunOutcome {
            setups: ranked.setups,
            rejections,
            analysed,
            evaluated,
            regime,
            partial,
            declines,
        })
    }

    fn analyse_instrument(&self, source: &dyn PriceSource, instrument: &Instrument) -> Analysis {
        let ticker = instrument.ticker.as_str();
        let deadline = Instant::now() + Duration::from_secs(self.config.instrument_timeout_secs);
        debug!(ticker, "analysing");

        let history = match source.fetch(ticker, self.as_of, self.config.lookback_years) {
            Ok(history) => history,
            Err(e) => {
                warn!(ticker, error = %e, "price fetch failed");
                return Analysis {
                    above_ema200: None,
                    decline: None,
                    evaluated: false,
                    outcome: Err(Rejection::new(
                        ticker,
                        RejectionStage::Data,
                        "fetch_failed",
                        e.to_string(),
                    )),
                };
            }
        };

        let data = MarketData::new(history);
        self.seed_from_cache(&data);
        let trend = trend_snapshot(&data);
        self.store_to_cache(&data);
        let above_ema200 = if trend.distance_to_ema200.is_nan() {
            None
        } else {
            Some(trend.distance_to_ema200 > 0.0)
        };
        let decline = Some(DeclineRecord {
            ticker: ticker.to_string(),
            decline_from_high: data.decline_from_high(90),
        });

        if let Some(rejection) = self.timeout_rejection(ticker, deadline) {
            return Analysis { above_ema200, decline, evaluated: false, outcome: Err(rejection) };
        }

        let screener = self.build_screener();
        let (result, errors) = screener.screen(&data, instrument, self.seeds.sub_seed(ticker));
        for e in errors {
            warn!(ticker, error = %e, "detector error");
        }

        if let Some(rejection) = self.timeout_rejection(ticker, deadline) {
            return Analysis { above_ema200, decline, evaluated: false, outcome: Err(rejection) };
        }

        match result {
            Ok(score) => Analysis {
                above_ema200,
                decline,
                evaluated: true,
                outcome: Ok((score, trend)),
            },
            Err(failure) => {
                let (evaluated, rejection) = match failure {
                    ScreenFailure::ContextInvalid { decline_from_high } => (
                        false,
                        Rejection::new(
                            ticker,
                            RejectionStage::Context,
                            "context_invalid",
                            format!(
                                "only {:.1}% below the 90-bar high",
                                decline_from_high * 100.0
                            ),
                        ),
                    ),
                    ScreenFailure::NoPatterns => (
                        false,
                        Rejection::new(
                            ticker,
                            RejectionStage::Pattern,
                            "no_patterns",
                            "no detector fired",
                        ),
                    ),
                    ScreenFailure::NoQualifiedPattern { evaluated } => (
                        true,
                        Rejection::new(
                            ticker,
                            RejectionStage::Evaluation,
                            "no_qualified_pattern",
                            format!("{evaluated} patterns evaluated, none survived the gates"),
                        ),
                    ),
                };
                Analysis { above_ema200, decline, evaluated, outcome: Err(rejection) }
            }
        }
    }

    /// The trend-filter series are the expensive long-window ones; reuse
    /// them across re-runs over the same as-of date.
    const CACHED_SERIES: [(SeriesKind, &'static str, usize); 2] =
        [(SeriesKind::Ema, "ema", 200), (SeriesKind::Atr, "atr", 14)];

    fn seed_from_cache(&self, data: &MarketData) {
        let Some(cache) = self.indicator_cache else { return };
        for (kind, name, window) in Self::CACHED_SERIES {
            match cache.get(data.ticker(), self.as_of, name, window) {
                Ok(Some(values)) => {
                    if let Err(e) = data.seed_series(kind, window, values) {
                        warn!(ticker = data.ticker(), error = %e, "stale cached series ignored");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(ticker = data.ticker(), error = %e, "indicator cache read failed"),
            }
        }
    }

    fn store_to_cache(&self, data: &MarketData) {
        let Some(cache) = self.indicator_cache else { return };
        for (kind, name, window) in Self::CACHED_SERIES {
            let series = match kind {
                SeriesKind::Ema => data.ema(window),
                SeriesKind::Atr => data.atr(window),
                _ => continue,
            };
            if let Err(e) = cache.put(data.ticker(), self.as_of, name, window, &series) {
                warn!(ticker = data.ticker(), error = %e, "indicator cache write failed");
            }
        }
    }

    fn timeout_rejection(&self, ticker: &str, deadline: Instant) -> Option<Rejection> {
        (Instant::now() > deadline).then(|| {
            Rejection::new(
                ticker,
                RejectionStage::Timeout,
                "timeout",
                format!("exceeded {}s budget", self.config.instrument_timeout_secs),
            )
        })
    }

    fn build_screener(&self) -> InstrumentScreener {
        let horizons: Vec<Horizon> = self.config.horizons.iter().map(|&h| Horizon(h)).collect();
        InstrumentScreener::new(
            MarketContextFilter {
                min_decline: self.config.min_decline_pct,
                high_lookback: 90,
            },
            DetectorRegistry::standard(),
            PatternEvaluator {
                evaluation_horizon: Horizon(self.config.evaluation_horizon()),
                horizons,
                core_min_n: self.config.min_sample_sizes.core,
                primary_min_n: self.config.min_sample_sizes.primary,
                secondary_min_n: self.config.min_sample_sizes.secondary,
                ev_floor: self.config.ev_floor,
                rrr_floor: self.config.rrr_floor,
                n_permutations: self.config.permutations,
            },
        )
    }
}

/// Trend and volatility measurements for the post-processor.
fn trend_snapshot(data: &MarketData) -> TrendSnapshot {
    let ema200 = data.ema(200);
    let last_ema = *ema200.last().unwrap_or(&f64::NAN);
    let distance_to_ema200 = if last_ema.is_nan() || last_ema <= 0.0 {
        f64::NAN
    } else {
        (data.last_close() - last_ema) / last_ema
    };

    let atr = data.atr(14);
    let closes = data.closes();
    let n = closes.len();
    let trailing_start = n.saturating_sub(252);
    let trailing_atr_pct: Vec<f64> = (trailing_start..n)
        .map(|i| if closes[i] > 0.0 { atr[i] / closes[i] } else { f64::NAN })
        .collect();
    let atr_pct = data.atr_pct(14);

    TrendSnapshot {
        distance_to_ema200,
        atr_pct,
        vol_regime: VolatilityRegime::classify(atr_pct, &trailing_atr_pct),
    }
}
