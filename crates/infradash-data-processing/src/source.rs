use std::fmt;
use std::path::PathBuf;

/// Address of a single object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobLocation {
    pub bucket: String,
    pub object: String,
}

impl BlobLocation {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

/// The reference layers the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Municipalities,
    Roads,
    Rails,
    Stations,
    Schools,
    Hospitals,
}

impl Layer {
    pub const ALL: [Self; 6] = [
        Self::Municipalities,
        Self::Roads,
        Self::Rails,
        Self::Stations,
        Self::Schools,
        Self::Hospitals,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Municipalities => "municipalities",
            Self::Roads => "roads",
            Self::Rails => "rails",
            Self::Stations => "stations",
            Self::Schools => "schools",
            Self::Hospitals => "hospitals",
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            Self::Municipalities => "muni_poly",
            other => other.name(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where each layer lives in the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreLayout {
    /// Bucket holding the geometry layers
    pub bucket: String,
    /// Object prefix of the geometry layers
    pub prefix: String,
    /// Branding image shown next to the selector
    pub logo: BlobLocation,
}

impl Default for ObjectStoreLayout {
    fn default() -> Self {
        Self {
            bucket: "wb-gpbp-infra-dashboard".to_string(),
            prefix: "shapefiles".to_string(),
            logo: BlobLocation::new("wb-ldt", "decision_engine/inputs/wbg-pimpam.png"),
        }
    }
}

impl ObjectStoreLayout {
    #[must_use]
    pub fn location(&self, layer: Layer) -> BlobLocation {
        let object = if self.prefix.is_empty() {
            format!("{}_final.geojson", layer.file_stem())
        } else {
            format!(
                "{}/{}_final.geojson",
                self.prefix.trim_end_matches('/'),
                layer.file_stem()
            )
        };
        BlobLocation::new(self.bucket.clone(), object)
    }
}

/// Where raw blobs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// HTTP object store (Google Cloud Storage by default)
    ObjectStore { base_url: String },
    /// A directory laid out as `<root>/<bucket>/<object>`
    LocalDir(PathBuf),
    /// Synthetic fixtures generated in memory
    Test,
}

pub const GCS_BASE_URL: &str = "https://storage.googleapis.com";

impl Default for DataSource {
    fn default() -> Self {
        Self::ObjectStore {
            base_url: GCS_BASE_URL.to_string(),
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectStore { base_url } => write!(f, "object store at {base_url}"),
            Self::LocalDir(dir) => write!(f, "local directory {}", dir.display()),
            Self::Test => f.write_str("test fixtures"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_matches_bucket_paths() {
        let layout = ObjectStoreLayout::default();
        assert_eq!(
            layout.location(Layer::Municipalities),
            BlobLocation::new("wb-gpbp-infra-dashboard", "shapefiles/muni_poly_final.geojson")
        );
        assert_eq!(
            layout.location(Layer::Roads).object,
            "shapefiles/roads_final.geojson"
        );
        assert_eq!(layout.logo.bucket, "wb-ldt");
    }

    #[test]
    fn test_empty_prefix() {
        let layout = ObjectStoreLayout {
            prefix: String::new(),
            ..Default::default()
        };
        assert_eq!(layout.location(Layer::Rails).object, "rails_final.geojson");
    }

    #[test]
    fn test_location_display() {
        let location = BlobLocation::new("bucket", "a/b.geojson");
        assert_eq!(location.to_string(), "gs://bucket/a/b.geojson");
    }
}
