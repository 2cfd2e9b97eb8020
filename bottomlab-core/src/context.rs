//! Market context gate ("the spirit level").
//!
//! Bottom fishing, not top chasing: an instrument is eligible only when its
//! current price has declined at least 10% from the trailing 90-bar high.
//! Instruments failing the gate are rejected before any scoring happens.

use serde::{Deserialize, Serialize};

use crate::market_data::MarketData;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketContext {
    /// Fractional distance from the trailing high; negative below the high.
    pub decline_from_high: f64,
    pub high_lookback: usize,
    pub context_valid: bool,
}

#[derive(Debug, Clone)]
pub struct MarketContextFilter {
    /// Minimum decline, as a positive fraction (0.10 = 10%).
    pub min_decline: f64,
    pub high_lookback: usize,
}

impl Default for MarketContextFilter {
    fn default() -> Self {
        Self { min_decline: 0.10, high_lookback: 90 }
    }
}

impl MarketContextFilter {
    pub fn check(&self, data: &MarketData) -> MarketContext {
        let decline = data.decline_from_high(self.high_lookback);
        MarketContext {
            decline_from_high: decline,
            high_lookback: self.high_lookback,
            context_valid: decline.is_finite() && decline <= -self.min_decline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, PriceHistory};
    use chrono::NaiveDate;

    fn market_data(closes: &[f64]) -> MarketData {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::new(
                    base + chrono::Duration::days(i as i64),
                    "TEST".into(),
                    c,
                    c * 1.01,
                    c * 0.99,
                    c,
                    1000.0,
                )
            })
            .collect();
        MarketData::new(PriceHistory::new(bars).unwrap())
    }

    #[test]
    fn declined_instrument_is_eligible() {
        // High 120, last 100: -16.7%
        let mut closes = vec![120.0; 10];
        closes.extend(vec![100.0; 10]);
        let ctx = MarketContextFilter::default().check(&market_data(&closes));
        assert!(ctx.context_valid);
        assert!(ctx.decline_from_high < -0.10);
    }

    #[test]
    fn instrument_at_high_is_rejected() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let ctx = MarketContextFilter::default().check(&market_data(&closes));
        assert!(!ctx.context_valid);
        assert!(ctx.decline_from_high.abs() < 1e-9);
    }

    #[test]
    fn boundary_exactly_ten_percent_is_eligible() {
        let mut closes = vec![100.0; 10];
        closes.push(90.0);
        let ctx = MarketContextFilter::default().check(&market_data(&closes));
        assert!(ctx.context_valid);
    }

    #[test]
    fn shallow_decline_is_rejected() {
        let mut closes = vec![100.0; 10];
        closes.push(92.0); // only -8%
        let ctx = MarketContextFilter::default().check(&market_data(&closes));
        assert!(!ctx.context_valid);
    }

    #[test]
    fn lookback_limits_the_high() {
        // Old spike at 200 outside the 90-bar window must not count
        let mut closes = vec![200.0];
        closes.extend(vec![100.0; 95]);
        let ctx = MarketContextFilter::default().check(&market_data(&closes));
        assert!(!ctx.context_valid);
    }
}
