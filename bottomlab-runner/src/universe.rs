//! Instrument universe file.
//!
//! Declarative TOML listing of tradable instruments. Order in the file does
//! not matter: the universe is sorted by ticker so digests and run output are
//! stable.

use serde::Deserialize;
use std::path::Path;

use bottomlab_core::domain::{Instrument, UniverseDigest};

use crate::config::ConfigError;

#[derive(Debug, Deserialize)]
struct UniverseFile {
    #[serde(default)]
    instrument: Vec<Instrument>,
}

#[derive(Debug, Clone)]
pub struct Universe {
    instruments: Vec<Instrument>,
}

impl Universe {
    pub fn new(mut instruments: Vec<Instrument>) -> Self {
        instruments.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        instruments.dedup_by(|a, b| a.ticker == b.ticker);
        Self { instruments }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: UniverseFile =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(Self::new(file.instrument))
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn digest(&self) -> UniverseDigest {
        UniverseDigest::of_tickers(self.instruments.iter().map(|i| i.ticker.as_str()))
    }
}
