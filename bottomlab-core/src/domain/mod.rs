//! Domain types: bars, price histories, instruments, deterministic ids.

pub mod bar;
pub mod ids;
pub mod instrument;

pub use bar::{Bar, BarError, PriceHistory};
pub use ids::{ConfigDigest, MarketDataId, UniverseDigest};
pub use instrument::{EarningsRisk, Geography, Instrument, LiquidityTier, Sector};
