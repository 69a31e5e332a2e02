//! Shared Error Types
//!
//! Errors raised while decoding or validating the data model, independent of
//! the server stack. The backend wraps these in `BackendError` / `StoreError`.
//!
//! # Error Categories
//!
//! - `ValidationError` - a field holds a value the model does not accept
//! - `SerializationError` - JSON encoding/decoding of a payload failed
//! - `PayloadError` - a change-capture record lacks a field the dispatcher needs
//!
//! # Usage
//!
//! ```rust
//! use hazel_sync::shared::error::SharedError;
//!
//! let error = SharedError::validation("direction", "unknown sync direction 'sideways'");
//! assert!(error.to_string().contains("direction"));
//! ```
use thiserror::Error;

/// Errors shared by the model and the backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// A field failed validation
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// A captured change record is missing data
    #[error("Payload error in table '{table}': {message}")]
    PayloadError {
        /// Source table of the record
        table: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn payload(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadError {
            table: table.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
