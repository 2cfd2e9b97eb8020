//! Run snapshots and the JSONL run history.
//!
//! Each run writes one self-contained JSON snapshot into the run-log
//! directory (temp-file + atomic rename) and appends one line to
//! `history.jsonl` for later meta-analysis. Two runs over identical inputs
//! differ only in their timestamps.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bottomlab_core::domain::{ConfigDigest, UniverseDigest};

use crate::pipeline::RunOutcome;
use crate::regime::RegimeAssessment;
use crate::setup::{Rejection, Setup};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub schema_version: u32,
    pub timestamp: DateTime<Utc>,
    pub config_digest: ConfigDigest,
    pub universe_digest: UniverseDigest,
    pub partial: bool,
    pub analysed: usize,
    pub evaluated: usize,
    pub regime: RegimeAssessment,
    pub setups: Vec<Setup>,
    pub rejections: Vec<Rejection>,
}

impl RunSnapshot {
    pub fn new(
        outcome: &RunOutcome,
        config_digest: ConfigDigest,
        universe_digest: UniverseDigest,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            timestamp,
            config_digest,
            universe_digest,
            partial: outcome.partial,
            analysed: outcome.analysed,
            evaluated: outcome.evaluated,
            regime: outcome.regime,
            setups: outcome.setups.clone(),
            rejections: outcome.rejections.clone(),
        }
    }

    /// Rejection counts keyed by stage label.
    pub fn rejections_by_stage(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.rejections {
            *counts.entry(r.stage.label()).or_insert(0) += 1;
        }
        counts
    }
}

/// One line of `history.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub config_digest: ConfigDigest,
    pub universe_digest: UniverseDigest,
    pub partial: bool,
    pub analysed: usize,
    pub setup_count: usize,
    pub rejections_by_stage: BTreeMap<String, usize>,
    pub regime: String,
}

pub struct RunLog {
    dir: PathBuf,
}

impl RunLog {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).context("create run-log directory")?;
        Ok(Self { dir })
    }

    /// Write the snapshot atomically and append the history line.
    /// Returns the snapshot path.
    pub fn persist(&self, snapshot: &RunSnapshot) -> Result<PathBuf> {
        let name = format!("run_{}.json", snapshot.timestamp.format("%Y%m%dT%H%M%S%.3f"));
        let path = self.dir.join(name);

        let json = serde_json::to_string_pretty(snapshot).context("serialize snapshot")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).context("create temp file")?;
        tmp.write_all(json.as_bytes()).context("write snapshot")?;
        tmp.persist(&path).context("atomic rename snapshot")?;

        let entry = HistoryEntry {
            timestamp: snapshot.timestamp,
            config_digest: snapshot.config_digest.clone(),
            universe_digest: snapshot.universe_digest.clone(),
            partial: snapshot.partial,
            analysed: snapshot.analysed,
            setup_count: snapshot.setups.len(),
            rejections_by_stage: snapshot
                .rejections_by_stage()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            regime: snapshot.regime.regime.label().to_string(),
        };
        let line = serde_json::to_string(&entry).context("serialize history entry")?;
        let mut history = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join("history.jsonl"))
            .context("open history.jsonl")?;
        writeln!(history, "{line}").context("append history line")?;

        Ok(path)
    }

    /// Load a snapshot, rejecting unknown schema versions.
    pub fn load(path: &Path) -> Result<RunSnapshot> {
        let contents = std::fs::read_to_string(path).context("read snapshot")?;
        let snapshot: RunSnapshot =
            serde_json::from_str(&contents).context("deserialize snapshot")?;
        if snapshot.schema_version > SCHEMA_VERSION {
            anyhow::bail!(
                "unsupported snapshot schema {} (max {})",
                snapshot.schema_version,
                SCHEMA_VERSION
            );
        }
        Ok(snapshot)
    }
}
