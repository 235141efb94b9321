//! Error types for the longitudinal view job.

use thiserror::Error;

/// Result type alias for longitudinal view operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the longitudinal view job.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid histogram registry: {0}")]
    InvalidRegistry(String),

    #[error("unknown stream: {0}")]
    UnknownStream(String),

    #[error("schema validation failed: {0}")]
    SchemaValidation(String),

    // Input errors (20-29)
    #[error("object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("decode failed for {key}: {reason}")]
    Decode { key: String, reason: String },

    // Record errors (30-39)
    #[error("field {field}: expected {expected}, got {actual}")]
    FieldType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    // Output errors (40-49)
    #[error("output already exists under {prefix}")]
    OutputExists { prefix: String },

    #[error("columnar write failed: {0}")]
    Write(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidRegistry(_) => 11,
            Error::UnknownStream(_) => 12,
            Error::SchemaValidation(_) => 13,
            Error::ObjectNotFound { .. } => 20,
            Error::Decode { .. } => 21,
            Error::FieldType { .. } => 30,
            Error::OutputExists { .. } => 40,
            Error::Write(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_category() {
        assert_eq!(Error::Config("x".into()).code(), 10);
        assert_eq!(
            Error::ObjectNotFound {
                key: "k".into()
            }
            .code(),
            20
        );
        assert_eq!(
            Error::OutputExists {
                prefix: "p".into()
            }
            .code(),
            40
        );
    }
}
