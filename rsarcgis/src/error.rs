use thiserror::Error;

use crate::collect::http::TransportError;
use crate::geo_core::BoundingBox;

/// Errors raised while talking to a feature service or exporting its records
#[derive(Debug, Error)]
pub enum ArcGisError {
    /// The endpoint string is not a usable FeatureServer/MapServer URL
    #[error("Invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Network or HTTP-level failure, or the service refused a metadata request
    #[error("Service unavailable at {url}: {message}")]
    ServiceUnavailable { url: String, message: String },

    /// The response could not be parsed into the expected schema
    #[error("Malformed response from {url}: {message}")]
    MalformedMetadata { url: String, message: String },

    /// No layer with the requested id (or name) exists in the service
    #[error("Layer {layer} not found (available: {available:?})")]
    LayerNotFound { layer: String, available: Vec<u32> },

    /// A requested field is not part of the layer's field catalog
    #[error("Field '{field}' does not exist in layer {layer_id}")]
    InvalidFieldName { field: String, layer_id: u32 },

    /// The server rejected the filter expression or field list
    #[error("Query rejected (code {code}): {message}")]
    QueryRejected {
        code: i64,
        message: String,
        details: Vec<String>,
    },

    /// Spatial filter with non-finite or inverted bounds
    #[error("Invalid bounding box: {0:?}")]
    InvalidBoundingBox(BoundingBox),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ArcGisError {
    pub(crate) fn unavailable(url: impl Into<String>, err: TransportError) -> Self {
        ArcGisError::ServiceUnavailable {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        ArcGisError::MalformedMetadata {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArcGisError>;
