use thiserror::Error;

use crate::source::BlobLocation;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "download_data")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Object {0} not found")]
    ObjectNotFound(BlobLocation),
    #[error("Access to {location} denied with status {status}")]
    Unauthorized { location: BlobLocation, status: u16 },
    #[error("Object store answered {status} for {location}")]
    UnexpectedStatus { location: BlobLocation, status: u16 },
    #[error("Unsupported coordinate reference system: {0}")]
    UnsupportedCrs(String),
    #[error("Expected a FeatureCollection in {0}")]
    NotAFeatureCollection(String),
    #[error("{0} is not cached and the download_data feature is disabled")]
    DownloadDisabled(BlobLocation),
}
