//! On-disk cache of raw object-store blobs.
//!
//! Each blob is stored at `<root>/raw/<bucket>/<object>` with a JSON sidecar
//! recording when it was fetched. A blob older than the configured TTL is
//! treated as missing.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, trace};

use super::Result;
use crate::source::BlobLocation;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    location: String,
    fetched_at: DateTime<Utc>,
    size: usize,
}

#[derive(Debug, Clone)]
pub struct BlobCache {
    root: PathBuf,
    ttl: Option<Duration>,
}

impl BlobCache {
    pub fn new(root: impl AsRef<Path>, ttl: Option<Duration>) -> Self {
        Self {
            root: root.as_ref().join("raw"),
            ttl,
        }
    }

    fn blob_path(&self, location: &BlobLocation) -> PathBuf {
        self.root.join(&location.bucket).join(&location.object)
    }

    fn meta_path(&self, location: &BlobLocation) -> PathBuf {
        let mut path = self.blob_path(location).into_os_string();
        path.push(".meta.json");
        PathBuf::from(path)
    }

    fn is_fresh(&self, meta: &CacheMeta, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return true;
        };
        chrono::Duration::from_std(ttl)
            .map(|ttl| now.signed_duration_since(meta.fetched_at) < ttl)
            .unwrap_or(true)
    }

    /// Return the cached blob if present and not expired.
    pub fn get_fresh(&self, location: &BlobLocation) -> Result<Option<Bytes>> {
        let meta_path = self.meta_path(location);
        let blob_path = self.blob_path(location);
        if !meta_path.exists() || !blob_path.exists() {
            trace!(%location, "Cache miss");
            return Ok(None);
        }

        let meta: CacheMeta = match serde_json::from_slice(&fs::read(&meta_path)?) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(%location, error = %e, "Unreadable cache metadata, refetching");
                return Ok(None);
            }
        };
        if !self.is_fresh(&meta, Utc::now()) {
            info!(%location, fetched_at = %meta.fetched_at, "Cached blob expired");
            return Ok(None);
        }

        let data = fs::read(&blob_path)?;
        if data.len() != meta.size {
            debug!(%location, expected = meta.size, actual = data.len(), "Truncated cache entry");
            return Ok(None);
        }
        debug!(%location, bytes = data.len(), "Cache hit");
        Ok(Some(Bytes::from(data)))
    }

    pub fn put(&self, location: &BlobLocation, data: &[u8]) -> Result<()> {
        let blob_path = self.blob_path(location);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&blob_path, data)?;
        let meta = CacheMeta {
            location: location.to_string(),
            fetched_at: Utc::now(),
            size: data.len(),
        };
        fs::write(self.meta_path(location), serde_json::to_vec_pretty(&meta)?)?;
        debug!(%location, path = ?blob_path, "Stored blob in cache");
        Ok(())
    }

    /// Remove a cached blob so the next load fetches it again.
    pub fn invalidate(&self, location: &BlobLocation) -> Result<()> {
        for path in [self.blob_path(location), self.meta_path(location)] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
