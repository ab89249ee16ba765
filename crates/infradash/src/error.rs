use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfraDashError {
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] infradash_data_processing::DataError),
    #[error("Municipality '{0}' is not in the reference set")]
    MunicipalityNotFound(String),
    #[error("Cannot compute map bounds for '{0}'")]
    InvalidBounds(String),
    #[error("Layer {layer} is in {found}, expected {expected}")]
    CrsMismatch {
        layer: String,
        expected: infradash_data_processing::Crs,
        found: infradash_data_processing::Crs,
    },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, InfraDashError>;

#[cfg(test)]
mod tests {
    use super::*;
    use infradash_data_processing::{BlobLocation, DataError};

    #[test]
    fn test_data_errors_keep_their_message() {
        let missing = BlobLocation::new("bucket", "shapefiles/roads_final.geojson");
        let err = InfraDashError::from(DataError::ObjectNotFound(missing));
        assert!(matches!(err, InfraDashError::DataProcessing(_)));
        assert!(err.to_string().contains("gs://bucket/shapefiles/roads_final.geojson"));
    }

    #[test]
    fn test_serde_errors_convert() {
        let err: InfraDashError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, InfraDashError::Serde(_)));
    }
}
