//! OHLCV bars and validated price histories.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Single OHLCV bar with date and symbol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        date: NaiveDate,
        symbol: String,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { date, symbol, open, high, low, close, volume }
    }

    /// Validate bar invariants.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.high < self.low {
            return Err(BarError::InvalidRange { high: self.high, low: self.low });
        }
        if self.open < 0.0 || self.high < 0.0 || self.low < 0.0 || self.close < 0.0 {
            return Err(BarError::NegativePrice);
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume);
        }
        if !(self.low..=self.high).contains(&self.open) {
            return Err(BarError::OpenOutOfRange);
        }
        if !(self.low..=self.high).contains(&self.close) {
            return Err(BarError::CloseOutOfRange);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum BarError {
    #[error("invalid bar range: high={high}, low={low}")]
    InvalidRange { high: f64, low: f64 },

    #[error("negative price not allowed")]
    NegativePrice,

    #[error("negative volume not allowed")]
    NegativeVolume,

    #[error("open price outside high/low range")]
    OpenOutOfRange,

    #[error("close price outside high/low range")]
    CloseOutOfRange,

    #[error("timestamps not strictly increasing at index {index}")]
    NonMonotonicTimestamps { index: usize },

    #[error("bar {index} validation failed: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: Box<BarError>,
    },

    #[error("empty price history")]
    Empty,
}

/// Validated, immutable ordered sequence of bars for one instrument.
///
/// Construction enforces: non-empty, strictly increasing dates (no
/// duplicates), non-negative prices and volume, OHLC range containment.
/// Indexing everywhere downstream is by bar ordinal, never by date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceHistory {
    bars: Vec<Bar>,
}

impl PriceHistory {
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        if bars.is_empty() {
            return Err(BarError::Empty);
        }
        for (i, bar) in bars.iter().enumerate() {
            bar.validate()
                .map_err(|e| BarError::InvalidBar { index: i, source: Box::new(e) })?;
            if i > 0 && bars[i - 1].date >= bar.date {
                return Err(BarError::NonMonotonicTimestamps { index: i });
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn symbol(&self) -> &str {
        &self.bars[0].symbol
    }

    pub fn last(&self) -> &Bar {
        self.bars.last().expect("PriceHistory is never empty")
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}
