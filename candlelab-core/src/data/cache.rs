//! Parquet cache for fetched bar series.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{interval}_{start}_{end}.parquet`
//! with a `.meta.json` sidecar per entry.
//!
//! - A present entry is loaded verbatim; freshness is not checked.
//! - Writes are atomic (write to .tmp, rename into place).
//! - Files that fail to load are quarantined (`.quarantined`) and reported as a miss.

use super::provider::{DataError, SeriesKey};
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Metadata sidecar for a cached series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub key: SeriesKey,
    pub bar_count: usize,
    pub first_bar: DateTime<Utc>,
    pub last_bar: DateTime<Utc>,
    pub data_hash: String,
    pub source: String,
    pub cached_at: DateTime<Utc>,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn stem(key: &SeriesKey) -> String {
        format!(
            "{}_{}_{}",
            key.interval,
            key.start.format("%Y%m%dT%H%M"),
            key.end.format("%Y%m%dT%H%M")
        )
    }

    /// Path to the parquet file for a key.
    pub fn entry_path(&self, key: &SeriesKey) -> PathBuf {
        self.symbol_dir(&key.symbol)
            .join(format!("{}.parquet", Self::stem(key)))
    }

    fn meta_path(&self, key: &SeriesKey) -> PathBuf {
        self.symbol_dir(&key.symbol)
            .join(format!("{}.meta.json", Self::stem(key)))
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.entry_path(key).exists()
    }

    /// Write a series under `key`, replacing any previous entry.
    pub fn write(&self, key: &SeriesKey, bars: &[Bar], source: &str) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        fs::create_dir_all(self.symbol_dir(&key.symbol))
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut df = bars_to_dataframe(bars)?;
        let path = self.entry_path(key);
        let tmp_path = path.with_extension("parquet.tmp");
        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            key: key.clone(),
            bar_count: bars.len(),
            first_bar: first.timestamp,
            last_bar: last.timestamp,
            data_hash: blake3::hash(
                &serde_json::to_vec(bars)
                    .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?,
            )
            .to_hex()
            .to_string(),
            source: source.to_string(),
            cached_at: Utc::now(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(key), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        debug!(path = %path.display(), bars = bars.len(), "cache entry written");
        Ok(())
    }

    /// Load the series cached under `key`.
    ///
    /// Returns `NoCachedData` on a miss. A corrupt file is quarantined and also
    /// reported as a miss so the caller can refetch.
    pub fn load(&self, key: &SeriesKey) -> Result<Vec<Bar>, DataError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Err(DataError::NoCachedData {
                key: key.to_string(),
            });
        }

        match load_and_validate_parquet(&path) {
            Ok(bars) => Ok(bars),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                let _ = fs::rename(&path, &quarantine);
                let _ = fs::remove_file(self.meta_path(key));
                Err(DataError::NoCachedData {
                    key: key.to_string(),
                })
            }
        }
    }

    pub fn get_meta(&self, key: &SeriesKey) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(key)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata of every cached entry, ordered by symbol then file name.
    pub fn entries(&self) -> Vec<CacheMeta> {
        let Ok(dirs) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut metas: Vec<(PathBuf, CacheMeta)> = dirs
            .flatten()
            .filter(|d| d.path().is_dir())
            .flat_map(|d| fs::read_dir(d.path()).into_iter().flatten().flatten())
            .map(|f| f.path())
            .filter(|p| p.to_string_lossy().ends_with(".meta.json"))
            .filter_map(|p| {
                let content = fs::read_to_string(&p).ok()?;
                let meta = serde_json::from_str(&content).ok()?;
                Some((p, meta))
            })
            .collect();
        metas.sort_by(|a, b| a.0.cmp(&b.0));
        metas.into_iter().map(|(_, m)| m).collect()
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn bars_to_dataframe(bars: &[Bar]) -> Result<DataFrame, DataError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp.timestamp_millis()).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("timestamp".into(), timestamps),
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<Bar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }
    for col_name in COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::CacheError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<Bar>, DataError> {
    let column_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column: {e}"))
    };
    let f64_col = |name: &str| -> Result<Vec<Option<f64>>, DataError> {
        let col = df.column(name).map_err(|e| column_err(name, e))?;
        let ca = col.f64().map_err(|e| column_err(name, e))?;
        Ok(ca.into_iter().collect())
    };

    let ts_col = df
        .column("timestamp")
        .map_err(|e| column_err("timestamp", e))?;
    let ts: Vec<Option<i64>> = ts_col
        .i64()
        .map_err(|e| column_err("timestamp", e))?
        .into_iter()
        .collect();
    let opens = f64_col("open")?;
    let highs = f64_col("high")?;
    let lows = f64_col("low")?;
    let closes = f64_col("close")?;
    let volumes = f64_col("volume")?;

    (0..df.height())
        .map(|i| {
            let millis = ts[i]
                .ok_or_else(|| DataError::ParquetError(format!("null timestamp at row {i}")))?;
            let timestamp = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| DataError::ParquetError(format!("bad timestamp at row {i}")))?;
            Ok(Bar::new(
                timestamp,
                opens[i].unwrap_or(f64::NAN),
                highs[i].unwrap_or(f64::NAN),
                lows[i].unwrap_or(f64::NAN),
                closes[i].unwrap_or(f64::NAN),
                volumes[i].unwrap_or(0.0),
            ))
        })
        .collect()
}
