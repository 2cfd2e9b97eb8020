//! Deterministic identifiers.
//!
//! BLAKE3 digests give stable, collision-resistant identity across builds and
//! platforms. `MarketDataId` ties situations to the exact history they were
//! detected against; the digests identify a run's configuration and universe.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::PriceHistory;

/// Identity of a `MarketData` instance: digest of symbol + bar dates + closes.
///
/// `Situation` records hold this id instead of a reference, so an index list
/// can never be applied to a different instrument's series unnoticed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketDataId(pub String);

impl MarketDataId {
    pub fn of(history: &PriceHistory) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(history.symbol().as_bytes());
        for bar in history.bars() {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.close.to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for MarketDataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Digest of the canonical JSON form of the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigDigest(pub String);

impl ConfigDigest {
    pub fn from_canonical_json(json: &str) -> Self {
        Self(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Digest of the instrument universe (tickers in sorted order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniverseDigest(pub String);

impl UniverseDigest {
    pub fn of_tickers<'a>(sorted_tickers: impl Iterator<Item = &'a str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for ticker in sorted_tickers {
            hasher.update(ticker.as_bytes());
            hasher.update(b"\n");
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for UniverseDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
