//! Error types for eoflow

use thiserror::Error;

/// Coarse classification of failures, used by orchestration to decide what to do with a
/// failed tile. None of these are retried inside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration or input; retrying will not help
    Configuration,
    /// A source or sink could not be read or written
    DataFetch,
    /// An archive operation was called out of order
    Precondition,
    /// Numeric, projection or serialization failure inside the core
    Internal,
}

#[derive(Debug, Error)]
pub enum EoflowError {
    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Composite strategy {strategy} is not supported. Only FIRST and LAST composite is supported")]
    UnsupportedComposite { strategy: String },

    #[error("Invalid tile code '{code}': {reason}")]
    InvalidTile { code: String, reason: String },

    #[error("Invalid geometry at feature {feature_id}: {reason}")]
    InvalidGeometry { feature_id: String, reason: String },

    #[error("Revisit {granule_id} belongs to tile {revisit_tile}, archive tile is {tile}")]
    RevisitMismatch {
        granule_id: String,
        revisit_tile: String,
        tile: String,
    },

    // Data fetch errors
    #[error("Failed to fetch band {band} of granule {granule_id} from {path}: {reason}")]
    BandFetch {
        granule_id: String,
        band: String,
        path: String,
        reason: String,
    },

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Storage error at {path}: {reason}")]
    Storage { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Precondition errors
    #[error("Cannot {operation}: archive must be {required}, but it is {actual}")]
    Precondition {
        operation: &'static str,
        required: &'static str,
        actual: &'static str,
    },

    // Internal errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Projection failed: {0}")]
    Projection(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl EoflowError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EoflowError::ConfigMissing { .. }
            | EoflowError::ConfigInvalid { .. }
            | EoflowError::UnsupportedComposite { .. }
            | EoflowError::InvalidTile { .. }
            | EoflowError::InvalidGeometry { .. }
            | EoflowError::RevisitMismatch { .. } => ErrorKind::Configuration,
            EoflowError::BandFetch { .. }
            | EoflowError::Decode { .. }
            | EoflowError::Storage { .. }
            | EoflowError::Io(_) => ErrorKind::DataFetch,
            EoflowError::Precondition { .. } => ErrorKind::Precondition,
            EoflowError::Serialization(_)
            | EoflowError::Projection(_)
            | EoflowError::Shape(_)
            | EoflowError::WorkerPool(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for EoflowError {
    fn from(e: serde_json::Error) -> Self {
        EoflowError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EoflowError>;
