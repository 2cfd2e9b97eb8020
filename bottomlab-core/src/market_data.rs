//! Market data with memoized derived series.
//!
//! Wraps a validated `PriceHistory` and computes derived series lazily,
//! caching each `(kind, window)` once. The cache is confined to one
//! instrument's pipeline run and released with the `MarketData`.
//!
//! Contract: identical `(PriceHistory, kind, window)` always yields identical
//! output; every series has the same length as the raw series with leading
//! NaN while the window fills; no value depends on bars past its own index.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{MarketDataId, PriceHistory};
use crate::error::EngineError;
use crate::indicators;

/// Derived series kind. The cache key is `(kind, window)`; kinds without a
/// window parameter use window 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    SimpleReturns,
    LogReturns,
    RollingMean,
    RollingStd,
    Ema,
    Rsi,
    Atr,
}

/// Per-instrument price series plus lazily computed, memoized indicators.
#[derive(Debug)]
pub struct MarketData {
    id: MarketDataId,
    history: PriceHistory,
    closes: Arc<Vec<f64>>,
    cache: Mutex<HashMap<(SeriesKind, usize), Arc<Vec<f64>>>>,
}

impl MarketData {
    pub fn new(history: PriceHistory) -> Self {
        let id = MarketDataId::of(&history);
        let closes = Arc::new(history.closes());
        Self { id, history, closes, cache: Mutex::new(HashMap::new()) }
    }

    pub fn id(&self) -> &MarketDataId {
        &self.id
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn ticker(&self) -> &str {
        self.history.symbol()
    }

    pub fn closes(&self) -> Arc<Vec<f64>> {
        Arc::clone(&self.closes)
    }

    pub fn last_close(&self) -> f64 {
        self.history.last().close
    }

    /// Seed a precomputed series (e.g. from the on-disk indicator cache)
    /// before the lazy computation runs. Rejected if the length does not
    /// match the price series, which would poison every consumer.
    pub fn seed_series(
        &self,
        kind: SeriesKind,
        window: usize,
        values: Vec<f64>,
    ) -> Result<(), EngineError> {
        if values.len() != self.len() {
            return Err(EngineError::Indicator(format!(
                "seeded series has {} values for a {}-bar history",
                values.len(),
                self.len()
            )));
        }
        let mut cache = self.cache.lock().expect("series cache poisoned");
        cache.entry((kind, window)).or_insert_with(|| Arc::new(values));
        Ok(())
    }

    fn get_or_compute(
        &self,
        kind: SeriesKind,
        window: usize,
        compute: impl FnOnce() -> Vec<f64>,
    ) -> Arc<Vec<f64>> {
        let mut cache = self.cache.lock().expect("series cache poisoned");
        Arc::clone(
            cache
                .entry((kind, window))
                .or_insert_with(|| Arc::new(compute())),
        )
    }

    pub fn returns(&self) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::SimpleReturns, 0, || {
            indicators::simple_returns(&self.closes)
        })
    }

    pub fn log_returns(&self) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::LogReturns, 0, || {
            indicators::log_returns(&self.closes)
        })
    }

    pub fn rolling_mean(&self, window: usize) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::RollingMean, window, || {
            indicators::rolling_mean(&self.closes, window)
        })
    }

    pub fn rolling_std(&self, window: usize) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::RollingStd, window, || {
            indicators::rolling_std(&self.closes, window)
        })
    }

    pub fn ema(&self, window: usize) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::Ema, window, || {
            indicators::ema(&self.closes, window)
        })
    }

    pub fn rsi(&self, window: usize) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::Rsi, window, || {
            indicators::rsi(&self.closes, window)
        })
    }

    pub fn atr(&self, window: usize) -> Arc<Vec<f64>> {
        self.get_or_compute(SeriesKind::Atr, window, || {
            indicators::atr(self.history.bars(), window)
        })
    }

    /// Current ATR as a fraction of the last close, NaN if not yet formed.
    pub fn atr_pct(&self, window: usize) -> f64 {
        let atr = self.atr(window);
        let last_atr = *atr.last().unwrap_or(&f64::NAN);
        let close = self.last_close();
        if last_atr.is_nan() || close <= 0.0 {
            f64::NAN
        } else {
            last_atr / close
        }
    }

    /// Fractional distance of the last close from the trailing `lookback`-bar
    /// high of closes (negative when below the high).
    pub fn decline_from_high(&self, lookback: usize) -> f64 {
        let n = self.closes.len();
        let start = n.saturating_sub(lookback);
        let high = self.closes[start..]
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        if high <= 0.0 || !high.is_finite() {
            return f64::NAN;
        }
        (self.last_close() - high) / high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, PriceHistory};
    use chrono::NaiveDate;

    fn make_market_data(closes: &[f64]) -> MarketData {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(
                    base + chrono::Duration::days(i as i64),
                    "TEST".into(),
                    c,
                    c + 1.0,
                    (c - 1.0).max(0.0),
                    c,
                    1000.0,
                )
            })
            .collect();
        MarketData::new(PriceHistory::new(bars).unwrap())
    }

    #[test]
    fn all_series_match_price_length() {
        let md = make_market_data(&[100.0, 101.0, 99.0, 102.0, 104.0, 103.0]);
        let n = md.len();
        assert_eq!(md.returns().len(), n);
        assert_eq!(md.log_returns().len(), n);
        assert_eq!(md.rolling_mean(3).len(), n);
        assert_eq!(md.rolling_std(3).len(), n);
        assert_eq!(md.ema(3).len(), n);
        assert_eq!(md.rsi(2).len(), n);
        assert_eq!(md.atr(2).len(), n);
    }

    #[test]
    fn cache_returns_same_allocation() {
        let md = make_market_data(&[100.0, 101.0, 99.0, 102.0]);
        let a = md.ema(2);
        let b = md.ema(2);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_windows_cached_separately() {
        let md = make_market_data(&[100.0, 101.0, 99.0, 102.0, 105.0]);
        let a = md.ema(2);
        let b = md.ema(3);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn decline_from_high_measures_drawdown() {
        // High of trailing window is 120, last close 96 → -20%
        let md = make_market_data(&[100.0, 120.0, 110.0, 96.0]);
        let d = md.decline_from_high(90);
        assert!((d - (-0.20)).abs() < 1e-12);
    }

    #[test]
    fn decline_from_high_at_high_is_zero() {
        let md = make_market_data(&[100.0, 110.0, 120.0]);
        assert!(md.decline_from_high(90).abs() < 1e-12);
    }

    #[test]
    fn atr_pct_nan_when_unformed() {
        let md = make_market_data(&[100.0, 101.0]);
        assert!(md.atr_pct(14).is_nan());
    }

    #[test]
    fn seeded_series_preempts_computation() {
        let md = make_market_data(&[100.0, 101.0, 99.0, 102.0]);
        let seeded = vec![1.0, 2.0, 3.0, 4.0];
        md.seed_series(SeriesKind::Ema, 2, seeded.clone()).unwrap();
        assert_eq!(*md.ema(2), seeded);
    }

    #[test]
    fn seed_with_wrong_length_is_rejected() {
        let md = make_market_data(&[100.0, 101.0, 99.0]);
        let err = md.seed_series(SeriesKind::Ema, 2, vec![1.0]).unwrap_err();
        assert!(!err.is_fatal());
        // The lazy computation still works afterwards
        assert_eq!(md.ema(2).len(), 3);
    }
}
