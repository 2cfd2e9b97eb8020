//! bottomlab runner
//!
//! Orchestrates the signal pipeline over an instrument universe: loads
//! configuration and universe files, fetches price histories, runs the core
//! screener on a worker pool, applies the post-processing risk layers,
//! ranks the survivors, and persists snapshots. Everything is deterministic
//! for a fixed (config, universe, data) triple regardless of worker count.

pub mod cache;
pub mod config;
pub mod costs;
pub mod pipeline;
pub mod postprocess;
pub mod ranker;
pub mod regime;
pub mod report;
pub mod rng;
pub mod setup;
pub mod snapshot;
pub mod source;
pub mod universe;
