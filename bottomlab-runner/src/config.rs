//! TOML engine configuration.
//!
//! One immutable value with every recognized option enumerated; the
//! orchestrator receives it and threads it explicitly. Validation happens up
//! front and a bad configuration fails the run before any work starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use bottomlab_core::domain::{ConfigDigest, Geography};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Measurement horizons in bars; the last is the evaluation horizon.
    #[serde(default = "default_horizons")]
    pub horizons: Vec<usize>,

    /// Context gate: minimum decline from the 90-bar high (fraction).
    #[serde(default = "default_min_decline_pct")]
    pub min_decline_pct: f64,

    #[serde(default)]
    pub min_sample_sizes: MinSampleSizes,

    /// Expected value must exceed this to survive evaluation.
    #[serde(default)]
    pub ev_floor: f64,

    /// Risk/reward floor at evaluation.
    #[serde(default = "default_rrr_floor")]
    pub rrr_floor: f64,

    /// Cost-adjusted edge floor in the post-processor.
    #[serde(default = "default_net_edge_floor")]
    pub net_edge_floor: f64,

    /// Portfolio size in account currency (SEK).
    #[serde(default = "default_portfolio_amount")]
    pub portfolio_currency_amount: f64,

    /// Positions below this notional are rejected.
    #[serde(default = "default_min_position")]
    pub min_position_currency: f64,

    #[serde(default)]
    pub regime_multipliers: RegimeMultipliers,

    #[serde(default)]
    pub fx_cost_by_geography: FxCosts,

    #[serde(default)]
    pub courtage_tier: CourtageTier,

    /// Ranked setups returned.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Worker pool size; `None` means available cores.
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// Master seed for the permutation tests.
    #[serde(default = "default_seed")]
    pub master_seed: u64,

    /// Sign-flip permutations per pattern.
    #[serde(default = "default_permutations")]
    pub permutations: usize,

    /// Per-instrument wall-clock budget.
    #[serde(default = "default_timeout")]
    pub instrument_timeout_secs: u64,

    /// Years of history requested from the price source.
    #[serde(default = "default_lookback_years")]
    pub lookback_years: f64,

    /// Per-sector cumulative allocation cap (fraction of portfolio).
    #[serde(default = "default_sector_cap")]
    pub sector_cap: f64,

    #[serde(default)]
    pub macro_signals: MacroSignals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MinSampleSizes {
    pub core: usize,
    pub primary: usize,
    pub secondary: usize,
}

impl Default for MinSampleSizes {
    fn default() -> Self {
        Self { core: 150, primary: 75, secondary: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegimeMultipliers {
    pub healthy: f64,
    pub cautious: f64,
    pub stressed: f64,
    pub crisis: f64,
}

impl Default for RegimeMultipliers {
    fn default() -> Self {
        Self { healthy: 1.0, cautious: 0.7, stressed: 0.4, crisis: 0.2 }
    }
}

/// One-way FX conversion cost per venue bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FxCosts {
    pub sweden: f64,
    pub nordic: f64,
    pub other: f64,
}

impl Default for FxCosts {
    fn default() -> Self {
        Self { sweden: 0.0, nordic: 0.0025, other: 0.005 }
    }
}

impl FxCosts {
    pub fn for_geography(&self, geography: Geography) -> f64 {
        match geography {
            Geography::Sweden => self.sweden,
            Geography::Nordic => self.nordic,
            Geography::Other => self.other,
        }
    }
}

/// Brokerage fee tier. Percentage rate with a minimum fee per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourtageTier {
    #[default]
    Mini,
    Small,
    Medium,
}

impl CourtageTier {
    /// (minimum fee in SEK, rate) per side.
    pub fn fee_schedule(self) -> (f64, f64) {
        match self {
            CourtageTier::Mini => (1.0, 0.00015),
            CourtageTier::Small => (7.0, 0.00035),
            CourtageTier::Medium => (15.0, 0.00056),
        }
    }

    /// Tier a portfolio of the given size would normally sit in.
    pub fn for_portfolio(amount: f64) -> Self {
        if amount <= 100_000.0 {
            CourtageTier::Mini
        } else if amount <= 250_000.0 {
            CourtageTier::Small
        } else {
            CourtageTier::Medium
        }
    }
}

/// Macro inputs to the regime model, assessed outside the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MacroSignals {
    #[serde(default)]
    pub yield_curve_inverted: bool,
    #[serde(default)]
    pub credit_spread_widening: bool,
}

fn default_horizons() -> Vec<usize> {
    vec![21, 42, 63]
}
fn default_min_decline_pct() -> f64 {
    0.10
}
fn default_rrr_floor() -> f64 {
    3.0
}
fn default_net_edge_floor() -> f64 {
    0.003
}
fn default_portfolio_amount() -> f64 {
    100_000.0
}
fn default_min_position() -> f64 {
    1_500.0
}
fn default_top_n() -> usize {
    5
}
fn default_seed() -> u64 {
    42
}
fn default_permutations() -> usize {
    1000
}
fn default_timeout() -> u64 {
    30
}
fn default_lookback_years() -> f64 {
    15.0
}
fn default_sector_cap() -> f64 {
    0.40
}

impl Default for EngineConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config must deserialize to defaults")
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizons.is_empty() {
            return Err(ConfigError::Invalid("horizons must not be empty".into()));
        }
        if self.horizons.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Invalid("horizons must be strictly ascending".into()));
        }
        if !(0.0..1.0).contains(&self.min_decline_pct) {
            return Err(ConfigError::Invalid("min_decline_pct must be in [0, 1)".into()));
        }
        let s = &self.min_sample_sizes;
        if !(s.secondary <= s.primary && s.primary <= s.core) || s.secondary == 0 {
            return Err(ConfigError::Invalid(
                "min_sample_sizes must satisfy 0 < secondary <= primary <= core".into(),
            ));
        }
        if self.portfolio_currency_amount <= 0.0 {
            return Err(ConfigError::Invalid("portfolio_currency_amount must be positive".into()));
        }
        if self.min_position_currency < 0.0 {
            return Err(ConfigError::Invalid("min_position_currency must not be negative".into()));
        }
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be at least 1".into()));
        }
        if self.permutations == 0 {
            return Err(ConfigError::Invalid("permutations must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.sector_cap) {
            return Err(ConfigError::Invalid("sector_cap must be in [0, 1]".into()));
        }
        let m = &self.regime_multipliers;
        for (name, v) in [
            ("healthy", m.healthy),
            ("cautious", m.cautious),
            ("stressed", m.stressed),
            ("crisis", m.crisis),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid(format!(
                    "regime multiplier {name} must be in [0, 1]"
                )));
            }
        }
        Ok(())
    }

    /// Digest over the canonical JSON form; identifies a run configuration.
    pub fn digest(&self) -> ConfigDigest {
        // serde_json on a struct emits fields in declaration order, which is
        // stable for a fixed build; nested maps are BTreeMaps
        let canonical: BTreeMap<String, serde_json::Value> = serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .expect("EngineConfig must serialize");
        let json = serde_json::to_string(&canonical).expect("canonical config must serialize");
        ConfigDigest::from_canonical_json(&json)
    }

    /// The evaluation horizon: the longest configured horizon.
    pub fn evaluation_horizon(&self) -> usize {
        *self.horizons.last().expect("validated: horizons non-empty")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
