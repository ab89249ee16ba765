use bytes::Bytes;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::source::{BlobLocation, DataSource};

pub mod cache;
#[cfg(feature = "download_data")]
pub mod fetch;

pub use super::error::Result;
use cache::BlobCache;

/// Reads raw objects by bucket and path.
pub trait BlobStore: Debug + Send + Sync {
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes>;

    /// Fetch several objects, preserving the input order.
    fn fetch_many(&self, locations: &[BlobLocation]) -> Result<Vec<Bytes>> {
        locations.iter().map(|location| self.fetch(location)).collect()
    }
}

/// Bounded retry with exponential backoff for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Options used when opening a [`DataSource`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cache directory; `None` disables the on-disk cache
    pub cache_dir: Option<PathBuf>,
    /// How long a cached blob stays fresh; `None` never expires
    pub cache_ttl: Option<Duration>,
    pub retry: RetryPolicy,
    /// Bearer token for private buckets
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            cache_dir: Some(crate::get_data_dir().clone()),
            cache_ttl: Some(Duration::from_secs(3600)),
            retry: RetryPolicy::default(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Environment variable holding an OAuth access token for the object store.
pub const TOKEN_ENV: &str = "INFRADASH_GCS_TOKEN";

impl DataSource {
    /// Open a blob store for this source.
    ///
    /// Remote stores are wrapped in a [`CachedStore`] when a cache directory is
    /// configured. Local directories and test fixtures are read directly.
    #[instrument(name = "Open data source", skip(options), level = "info")]
    pub fn open(&self, options: &FetchOptions) -> Result<Arc<dyn BlobStore>> {
        match self {
            Self::Test => {
                info!("Using in-memory test fixtures");
                Ok(Arc::new(crate::test_data::TestObjectStore::new()?))
            }
            Self::LocalDir(dir) => Ok(Arc::new(LocalDirStore::new(dir))),
            Self::ObjectStore { base_url } => {
                let remote = remote_store(base_url, options)?;
                match &options.cache_dir {
                    Some(dir) => Ok(Arc::new(CachedStore::new(
                        remote,
                        BlobCache::new(dir, options.cache_ttl),
                    ))),
                    None => {
                        warn!("Blob cache disabled, every load hits the network");
                        Ok(remote)
                    }
                }
            }
        }
    }
}

#[cfg(feature = "download_data")]
fn remote_store(base_url: &str, options: &FetchOptions) -> Result<Arc<dyn BlobStore>> {
    Ok(Arc::new(fetch::HttpObjectStore::new(base_url, options)?))
}

#[cfg(not(feature = "download_data"))]
fn remote_store(base_url: &str, _options: &FetchOptions) -> Result<Arc<dyn BlobStore>> {
    warn!(base_url, "Download_data feature is disabled, only cached blobs are readable");
    Ok(Arc::new(OfflineStore))
}

/// Stands in for the HTTP store when downloads are compiled out.
#[cfg(not(feature = "download_data"))]
#[derive(Debug)]
struct OfflineStore;

#[cfg(not(feature = "download_data"))]
impl BlobStore for OfflineStore {
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        Err(crate::DataError::DownloadDisabled(location.clone()))
    }
}

/// Reads blobs from `<root>/<bucket>/<object>`.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path_for(&self, location: &BlobLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.object)
    }
}

impl BlobStore for LocalDirStore {
    #[instrument(name = "Read local blob", skip(self), fields(location = %location), level = "debug")]
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        let path = self.path_for(location);
        match std::fs::read(&path) {
            Ok(data) => {
                debug!(path = ?path, bytes = data.len(), "Read blob from disk");
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(crate::DataError::ObjectNotFound(location.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Serves fresh blobs from a [`BlobCache`] and falls back to the inner store.
#[derive(Debug)]
pub struct CachedStore {
    inner: Arc<dyn BlobStore>,
    cache: BlobCache,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn BlobStore>, cache: BlobCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }
}

impl BlobStore for CachedStore {
    fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        if let Some(hit) = self.cache.get_fresh(location)? {
            return Ok(hit);
        }
        let data = self.inner.fetch(location)?;
        self.cache.put(location, &data)?;
        Ok(data)
    }

    fn fetch_many(&self, locations: &[BlobLocation]) -> Result<Vec<Bytes>> {
        let mut results: Vec<Option<Bytes>> = Vec::with_capacity(locations.len());
        let mut missing = Vec::new();
        for (idx, location) in locations.iter().enumerate() {
            let hit = self.cache.get_fresh(location)?;
            if hit.is_none() {
                missing.push(idx);
            }
            results.push(hit);
        }
        info!(
            cached = locations.len() - missing.len(),
            missing = missing.len(),
            "Checked blob cache"
        );

        if !missing.is_empty() {
            let to_fetch: Vec<BlobLocation> =
                missing.iter().map(|&idx| locations[idx].clone()).collect();
            let fetched = self.inner.fetch_many(&to_fetch)?;
            for (idx, data) in missing.into_iter().zip(fetched) {
                self.cache.put(&locations[idx], &data)?;
                results[idx] = Some(data);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}
