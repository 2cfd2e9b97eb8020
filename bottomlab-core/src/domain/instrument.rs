//! Instrument universe records.
//!
//! Geography drives the FX cost tier, liquidity tier drives the spread
//! estimate, and the all-weather flag exempts an instrument from the CRISIS
//! regime multiplier.

use serde::{Deserialize, Serialize};

/// Geography of the listing venue, disambiguated by ticker suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geography {
    Sweden,
    Nordic,
    Other,
}

impl Geography {
    /// Classify from the ticker suffix: `.ST` is Swedish, `.CO`/`.OL`/`.HE`
    /// other Nordic venues, everything else foreign.
    pub fn from_ticker(ticker: &str) -> Self {
        if ticker.ends_with(".ST") {
            Geography::Sweden
        } else if ticker.ends_with(".CO") || ticker.ends_with(".OL") || ticker.ends_with(".HE") {
            Geography::Nordic
        } else {
            Geography::Other
        }
    }
}

/// Liquidity class used by the spread heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidityTier {
    LargeCap,
    MidCap,
    SmallCap,
}

/// Earnings-window risk assessment, supplied by the universe file.
///
/// The engine only consumes the assessment; producing it (an earnings
/// calendar) is an external concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EarningsRisk {
    #[default]
    None,
    Warning,
    High,
}

/// Sector label used for the per-sector allocation cap.
pub type Sector = String;

/// One tradable instrument in the universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub name: String,
    pub sector: Sector,
    pub geography: Geography,
    #[serde(default)]
    pub all_weather: bool,
    pub liquidity_tier: LiquidityTier,
    #[serde(default)]
    pub earnings_risk: EarningsRisk,
}

impl Instrument {
    /// Defensive sectors retain half allocation under CRISIS regime.
    pub fn is_defensive_sector(&self) -> bool {
        matches!(
            self.sector.to_ascii_lowercase().as_str(),
            "utilities" | "consumer staples" | "healthcare"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geography_from_suffix() {
        assert_eq!(Geography::from_ticker("ERIC-B.ST"), Geography::Sweden);
        assert_eq!(Geography::from_ticker("NOVO-B.CO"), Geography::Nordic);
        assert_eq!(Geography::from_ticker("EQNR.OL"), Geography::Nordic);
        assert_eq!(Geography::from_ticker("AAPL"), Geography::Other);
    }

    #[test]
    fn defensive_sector_detection() {
        let mut inst = Instrument {
            ticker: "XLU".into(),
            name: "Utilities ETF".into(),
            sector: "Utilities".into(),
            geography: Geography::Other,
            all_weather: false,
            liquidity_tier: LiquidityTier::LargeCap,
            earnings_risk: EarningsRisk::None,
        };
        assert!(inst.is_defensive_sector());
        inst.sector = "Industrials".into();
        assert!(!inst.is_defensive_sector());
    }
}
