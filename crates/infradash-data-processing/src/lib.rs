//! Data access layer for the infradash dashboard.
//!
//! Fetches the reference GeoJSON layers (municipality boundaries, roads, rails,
//! stations, schools, hospitals) from an object store, caches the raw blobs on
//! disk and decodes them into typed feature collections.
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::debug;

pub mod error;
pub mod processed;
pub mod raw;
pub mod source;
pub mod test_data;

pub use error::{DataError, Result};
pub use processed::crs::Crs;
pub use processed::schema::{
    FacilityAttributes, FeatureSchema, JsonObject, MunicipalityAttributes, RailAttributes,
    RoadAttributes, RoadClass, StationAttributes,
};
pub use processed::{Feature, FeatureCollection, RejectedFeature, decode_feature_collection};
pub use raw::cache::BlobCache;
pub use raw::{BlobStore, CachedStore, FetchOptions, LocalDirStore, RetryPolicy};
pub use source::{BlobLocation, DataSource, Layer, ObjectStoreLayout};
pub use test_data::{TEST_MUNICIPALITIES, TestObjectStore, create_test_data};

pub const DATA_DIR_DEFAULT: &str = "./infradash_data";

/// Environment variable overriding the cache directory.
pub const DATA_DIR_ENV: &str = "INFRADASH_DATA_DIR";

/// Global data directory used for the raw blob cache.
///
/// Resolution order: `INFRADASH_DATA_DIR`, the platform cache directory (with
/// the `system-dirs` feature), then [`DATA_DIR_DEFAULT`].
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    #[cfg(feature = "system-dirs")]
    {
        if let Some(dirs) = directories::ProjectDirs::from("org", "gpbp", "infradash") {
            let dir = dirs.cache_dir().to_path_buf();
            debug!(dir = ?dir, "Using platform cache directory");
            return dir;
        }
    }
    debug!("Falling back to default data directory");
    PathBuf::from(DATA_DIR_DEFAULT)
});

pub fn get_data_dir() -> &'static PathBuf {
    &DATA_DIR
}
