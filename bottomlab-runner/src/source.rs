//! Price sources.
//!
//! The pipeline consumes `PriceSource`; retrieval itself is an external
//! concern. Ships with a CSV-directory source for cached data and a
//! deterministic synthetic source for tests and fixtures. Fetch failures are
//! non-fatal: the pipeline converts them to data-stage rejections.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

use bottomlab_core::domain::{Bar, PriceHistory};
use bottomlab_core::error::EngineError;

pub trait PriceSource: Send + Sync {
    /// Fetch up to `lookback_years` of daily bars ending at `as_of`.
    fn fetch(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        lookback_years: f64,
    ) -> Result<PriceHistory, EngineError>;
}

/// Reads `<dir>/<ticker>.csv` with columns
/// `date,open,high,low,close,volume` (header required, ISO dates).
pub struct CsvPriceSource {
    dir: PathBuf,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[derive(Debug, serde::Deserialize)]
struct CsvBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl PriceSource for CsvPriceSource {
    fn fetch(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        lookback_years: f64,
    ) -> Result<PriceHistory, EngineError> {
        let path = self.dir.join(format!("{ticker}.csv"));
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| EngineError::data(ticker, format!("open {}: {e}", path.display())))?;

        let earliest = as_of - chrono::Duration::days((lookback_years * 365.25) as i64);
        let mut bars = Vec::new();
        for record in reader.deserialize::<CsvBar>() {
            let row = record.map_err(|e| EngineError::data(ticker, format!("bad row: {e}")))?;
            if row.date < earliest || row.date > as_of {
                continue;
            }
            bars.push(Bar::new(
                row.date,
                ticker.to_string(),
                row.open,
                row.high,
                row.low,
                row.close,
                row.volume,
            ));
        }

        PriceHistory::new(bars).map_err(|e| EngineError::data(ticker, e.to_string()))
    }
}

/// Deterministic synthetic walks, one per ticker, for fixtures and tests.
///
/// The walk alternates decline and recovery phases so context gates and
/// reversal detectors have something to find. Identical `(seed, ticker,
/// as_of, lookback)` always produces identical bars.
pub struct SyntheticPriceSource {
    seed: u64,
}

impl SyntheticPriceSource {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn ticker_seed(&self, ticker: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(ticker.as_bytes());
        u64::from_le_bytes(hasher.finalize().as_bytes()[..8].try_into().expect("8 bytes"))
    }
}

impl PriceSource for SyntheticPriceSource {
    fn fetch(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        lookback_years: f64,
    ) -> Result<PriceHistory, EngineError> {
        let bars_wanted = (lookback_years * 252.0) as usize;
        if bars_wanted < 2 {
            return Err(EngineError::data(ticker, "lookback too short"));
        }
        let mut rng = StdRng::seed_from_u64(self.ticker_seed(ticker));
        let mut price = 50.0 + rng.gen::<f64>() * 150.0;
        let phase_len = 60 + (rng.gen::<u64>() % 80) as usize;

        let mut bars = Vec::with_capacity(bars_wanted);
        let mut date = as_of - chrono::Duration::days(bars_wanted as i64 * 7 / 5 + 10);
        let mut i = 0usize;
        while bars.len() < bars_wanted && date <= as_of {
            // Skip weekends
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                date += chrono::Duration::days(1);
                continue;
            }
            let declining = (i / phase_len) % 2 == 0;
            let drift = if declining { -0.0035 } else { 0.004 };
            let noise = (rng.gen::<f64>() - 0.5) * 0.03;
            price = (price * (1.0 + drift + noise)).max(1.0);

            let open = price * (1.0 + (rng.gen::<f64>() - 0.5) * 0.004);
            let spread = price * (0.005 + rng.gen::<f64>() * 0.01);
            let high = open.max(price) + spread;
            let low = (open.min(price) - spread).max(0.5);
            let volume = 50_000.0 + rng.gen::<f64>() * 500_000.0;

            bars.push(Bar::new(date, ticker.to_string(), open, high, low, price, volume));
            date += chrono::Duration::days(1);
            i += 1;
        }

        PriceHistory::new(bars).map_err(|e| EngineError::data(ticker, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    #[test]
    fn synthetic_is_deterministic() {
        let source = SyntheticPriceSource::new(42);
        let a = source.fetch("SINCH.ST", as_of(), 2.0).unwrap();
        let b = source.fetch("SINCH.ST", as_of(), 2.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn synthetic_differs_per_ticker() {
        let source = SyntheticPriceSource::new(42);
        let a = source.fetch("SINCH.ST", as_of(), 2.0).unwrap();
        let b = source.fetch("ERIC-B.ST", as_of(), 2.0).unwrap();
        assert_ne!(a.last().close, b.last().close);
    }

    #[test]
    fn synthetic_produces_valid_history() {
        let source = SyntheticPriceSource::new(7);
        let history = source.fetch("TEST", as_of(), 5.0).unwrap();
        assert!(history.len() > 1000);
        // PriceHistory::new already validated bars and ordering
        assert!(history.bars().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn csv_source_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ABC.csv");
        std::fs::write(
            &path,
            "date,open,high,low,close,volume\n\
             2025-01-02,100.0,102.0,99.0,101.0,5000\n\
             2025-01-03,101.0,103.0,100.0,102.5,6000\n",
        )
        .unwrap();

        let source = CsvPriceSource::new(dir.path());
        let history = source.fetch("ABC", as_of(), 5.0).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().close, 102.5);
    }

    #[test]
    fn csv_missing_file_is_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvPriceSource::new(dir.path());
        let err = source.fetch("MISSING", as_of(), 5.0).unwrap_err();
        assert!(!err.is_fatal());
    }
}
