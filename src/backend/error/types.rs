/**
 * Backend Error Types
 *
 * `BackendError` is what HTTP handlers return. It wraps the pipeline errors
 * from `error::sync` and the shared model errors, and knows which status code
 * each of them maps to.
 *
 * # Status Code Mapping
 *
 * - bad request body / payload - 400
 * - missing or wrong webhook secret - 401
 * - configuration errors - 422
 * - not found - 404
 * - provider API / transport errors - 502
 * - store errors - 500
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::error::sync::{ProviderError, SyncError};
use crate::shared::SharedError;

/// Backend-specific error types
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error with an explicit status
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// The request carried no valid webhook credentials
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// Shared model error
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from the synchronization pipeline
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::SharedError(_) => StatusCode::BAD_REQUEST,
            Self::SerializationError(_) => StatusCode::BAD_REQUEST,
            Self::Sync(err) => match err {
                SyncError::Configuration { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SyncError::NotFound { .. } => StatusCode::NOT_FOUND,
                SyncError::ProviderNotSupported { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SyncError::Provider(ProviderError::Configuration { .. }) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SyncError::Provider(_) => StatusCode::BAD_GATEWAY,
                SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::Unauthorized { message } => message.clone(),
            Self::SharedError(err) => err.to_string(),
            Self::SerializationError(err) => err.to_string(),
            Self::Sync(err) => err.to_string(),
        }
    }
}
