//! Optional on-disk indicator cache.
//!
//! Re-runs over the same as-of date can skip recomputing derived series.
//! Keyed by `(ticker, as_of_date, indicator, window)`; one JSON file per
//! `(ticker, as_of_date)` holding a map of `indicator_window` entries.
//! Writes are last-write-wins under a mutex and land via temp-file +
//! atomic rename, so a crashed run never leaves a torn file.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    series: BTreeMap<String, Vec<f64>>,
}

pub struct IndicatorCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl IndicatorCache {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).context("create indicator cache directory")?;
        Ok(Self { dir, write_lock: Mutex::new(()) })
    }

    fn file_path(&self, ticker: &str, as_of: NaiveDate) -> PathBuf {
        // Tickers carry dots and dashes; both are path-safe
        self.dir.join(format!("{ticker}_{as_of}.json"))
    }

    fn series_key(indicator: &str, window: usize) -> String {
        format!("{indicator}_{window}")
    }

    pub fn get(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        indicator: &str,
        window: usize,
    ) -> Result<Option<Vec<f64>>> {
        let path = self.file_path(ticker, as_of);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("read cache file")?;
        let file: CacheFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            // A corrupt file is treated as a miss, not an error
            Err(_) => return Ok(None),
        };
        Ok(file.series.get(&Self::series_key(indicator, window)).cloned())
    }

    /// Insert or overwrite one series. Last write wins.
    pub fn put(
        &self,
        ticker: &str,
        as_of: NaiveDate,
        indicator: &str,
        window: usize,
        values: &[f64],
    ) -> Result<()> {
        let _guard = self.write_lock.lock().expect("cache write lock poisoned");

        let path = self.file_path(ticker, as_of);
        let mut file: CacheFile = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str(&c).ok())
                .unwrap_or_default()
        } else {
            CacheFile::default()
        };
        file.series.insert(Self::series_key(indicator, window), values.to_vec());

        let json = serde_json::to_string(&file).context("serialize cache file")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).context("create temp file")?;
        tmp.write_all(json.as_bytes()).context("write temp file")?;
        tmp.persist(&path).context("atomic rename into cache")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 30).unwrap()
    }

    #[test]
    fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndicatorCache::new(dir.path()).unwrap();

        assert!(cache.get("ERIC-B.ST", as_of(), "ema", 200).unwrap().is_none());

        let series = vec![f64::NAN, 1.0, 2.0];
        cache.put("ERIC-B.ST", as_of(), "ema", 200, &series).unwrap();
        let hit = cache.get("ERIC-B.ST", as_of(), "ema", 200).unwrap().unwrap();
        assert_eq!(hit.len(), 3);
        assert!(hit[0].is_nan());
        assert_eq!(hit[2], 2.0);
    }

    #[test]
    fn windows_are_distinct_keys() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndicatorCache::new(dir.path()).unwrap();
        cache.put("X.ST", as_of(), "ema", 20, &[1.0]).unwrap();
        cache.put("X.ST", as_of(), "ema", 200, &[2.0]).unwrap();
        assert_eq!(cache.get("X.ST", as_of(), "ema", 20).unwrap().unwrap(), vec![1.0]);
        assert_eq!(cache.get("X.ST", as_of(), "ema", 200).unwrap().unwrap(), vec![2.0]);
    }

    #[test]
    fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndicatorCache::new(dir.path()).unwrap();
        cache.put("X.ST", as_of(), "rsi", 14, &[1.0]).unwrap();
        cache.put("X.ST", as_of(), "rsi", 14, &[9.0]).unwrap();
        assert_eq!(cache.get("X.ST", as_of(), "rsi", 14).unwrap().unwrap(), vec![9.0]);
    }

    #[test]
    fn corrupt_file_reads_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IndicatorCache::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("X.ST_2026-01-30.json"), "not json").unwrap();
        assert!(cache.get("X.ST", as_of(), "ema", 20).unwrap().is_none());
    }
}
