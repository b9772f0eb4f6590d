//! Bar loading and data resolution for the runner.
//!
//! Resolves one series key to a validated `BarSeries`. Fallback policy:
//! 1. If cached data exists → use it verbatim
//! 2. If not cached and a source is available → fetch and cache
//! 3. If nothing could be loaded and `synthetic` is set → generate synthetic bars
//! 4. Otherwise → fail with a clear error
//!
//! Synthetic data is never written to the cache.

use candlelab_core::data::{
    BarSource, DataError, DataSource, ParquetCache, SeriesKey, SyntheticSource,
};
use candlelab_core::domain::{Bar, BarSeries};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for {key} and no network access (use --synthetic for synthetic data)")]
    NoCachedDataOffline { key: String },

    #[error("no cached data for {key} and download failed: {source}")]
    DownloadFailed {
        key: String,
        #[source]
        source: DataError,
    },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// If true, never make network requests.
    pub offline: bool,
    /// If true, generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Skip the cache and fetch again.
    pub force: bool,
}

/// Result of loading bars, including data source provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: BarSeries,
    pub source: DataSource,
    /// BLAKE3 over every bar, for fingerprinting.
    pub dataset_hash: String,
}

/// Load the series for `key` from the cache, with fallback to fetch or synthetic.
pub fn load_bars(
    key: &SeriesKey,
    cache: &ParquetCache,
    source: Option<&dyn BarSource>,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    // Step 1: cache
    if !opts.force {
        match cache.load(key) {
            Ok(bars) => {
                info!(%key, bars = bars.len(), "loading cached price data");
                return finish(bars, DataSource::Cache);
            }
            Err(DataError::NoCachedData { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    // Step 2: fetch
    let mut fetch_error = None;
    if !opts.offline {
        if let Some(src) = source {
            info!(%key, source = src.name(), "fetching new price data");
            match src.fetch(key) {
                Ok(bars) => {
                    if let Err(e) = cache.write(key, &bars, src.name()) {
                        warn!(%key, error = %e, "failed to cache fetched bars");
                    }
                    return finish(bars, DataSource::Binance);
                }
                Err(e) => {
                    warn!(%key, error = %e, "fetch failed");
                    fetch_error = Some(e);
                }
            }
        }
    }

    // Step 3: synthetic fallback
    if opts.synthetic {
        warn!(%key, "generating synthetic data; results are not market data");
        let bars = SyntheticSource::default().fetch(key)?;
        return finish(bars, DataSource::Synthetic);
    }

    // Step 4: fail
    match fetch_error {
        Some(source) => Err(LoadError::DownloadFailed {
            key: key.to_string(),
            source,
        }),
        None => Err(LoadError::NoCachedDataOffline {
            key: key.to_string(),
        }),
    }
}

fn finish(bars: Vec<Bar>, source: DataSource) -> Result<LoadedData, LoadError> {
    let dataset_hash = compute_dataset_hash(&bars);
    let series = BarSeries::new(bars)?;
    Ok(LoadedData {
        series,
        source,
        dataset_hash,
    })
}

/// Compute a deterministic BLAKE3 hash over all bar data.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candlelab_core::data::Interval;
    use chrono::{Duration, TimeZone, Utc};

    fn key() -> SeriesKey {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        SeriesKey::new("BTCUSDT", Interval::Hour1, start, start + Duration::days(3))
    }

    /// Source that always fails.
    struct Unreachable;

    impl BarSource for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }
        fn fetch(&self, _key: &SeriesKey) -> Result<Vec<Bar>, DataError> {
            Err(DataError::NetworkUnreachable("test".into()))
        }
    }

    /// Source serving the synthetic generator under another name.
    struct Fixture;

    impl BarSource for Fixture {
        fn name(&self) -> &str {
            "fixture"
        }
        fn fetch(&self, key: &SeriesKey) -> Result<Vec<Bar>, DataError> {
            SyntheticSource::with_seed(3).fetch(key)
        }
    }

    #[test]
    fn fetch_populates_cache_then_cache_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        let first = load_bars(&key(), &cache, Some(&Fixture), &LoadOptions::default()).unwrap();
        assert_eq!(first.source, DataSource::Binance);
        assert_eq!(first.series.len(), 72);
        assert!(cache.contains(&key()));

        let second = load_bars(&key(), &cache, None, &LoadOptions::default()).unwrap();
        assert_eq!(second.source, DataSource::Cache);
        assert_eq!(second.dataset_hash, first.dataset_hash);
    }

    #[test]
    fn offline_without_cache_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let opts = LoadOptions {
            offline: true,
            ..LoadOptions::default()
        };

        let err = load_bars(&key(), &cache, Some(&Fixture), &opts).unwrap_err();
        assert!(matches!(err, LoadError::NoCachedDataOffline { .. }));
        assert!(err.to_string().contains("no cached data"));
    }

    #[test]
    fn failed_fetch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        let err = load_bars(&key(), &cache, Some(&Unreachable), &LoadOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::DownloadFailed { .. }));
    }

    #[test]
    fn synthetic_fallback_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let opts = LoadOptions {
            synthetic: true,
            ..LoadOptions::default()
        };

        let loaded = load_bars(&key(), &cache, Some(&Unreachable), &opts).unwrap();
        assert_eq!(loaded.source, DataSource::Synthetic);
        assert_eq!(loaded.series.len(), 72);
        assert!(!cache.contains(&key()));
    }

    #[test]
    fn force_refetches_over_a_cached_series() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let stale = SyntheticSource::with_seed(99).fetch(&key()).unwrap();
        cache.write(&key(), &stale, "stale").unwrap();

        let opts = LoadOptions {
            force: true,
            ..LoadOptions::default()
        };
        let loaded = load_bars(&key(), &cache, Some(&Fixture), &opts).unwrap();
        assert_eq!(loaded.source, DataSource::Binance);
        assert_ne!(loaded.dataset_hash, compute_dataset_hash(&stale));

        // The fresh series replaced the stale one on disk.
        let cached = load_bars(&key(), &cache, None, &LoadOptions::default()).unwrap();
        assert_eq!(cached.source, DataSource::Cache);
        assert_eq!(cached.dataset_hash, loaded.dataset_hash);
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let bars = SyntheticSource::default().fetch(&key()).unwrap();
        assert_eq!(compute_dataset_hash(&bars), compute_dataset_hash(&bars));
        assert_ne!(compute_dataset_hash(&bars), compute_dataset_hash(&bars[1..]));
    }
}
