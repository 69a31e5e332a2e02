/**
 * Synchronization Error Types
 *
 * One error enum per layer of the pipeline:
 *
 * - `ProviderError` - raised by a Provider Adapter (bad input, rejected call, network)
 * - `StoreError` - raised by a persistence implementation
 * - `SyncError` - raised by the Sync Worker and the Channel-Access engine
 *
 * Dedupe outcomes (`deduped`, `already_linked`, `ignored_*`) are not errors;
 * they are returned as `SyncOutcome` values so callers can count them.
 */

use thiserror::Error;

use crate::shared::SharedError;

/// Whether an HTTP status from a platform API is worth retrying
///
/// 408 and 429 are transient by definition, every 5xx is treated as transient,
/// any other status is a final answer from the platform.
pub fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// Errors raised by a Provider Adapter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Bad input or missing credentials; the remote API was not called
    #[error("Provider configuration error: {message}")]
    Configuration { message: String },

    /// The platform rejected the call
    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced an HTTP response
    #[error("Provider transport error: {message}")]
    Transport { message: String },
}

impl ProviderError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration { .. } => false,
            Self::Api { status, .. } => is_retryable_status(*status),
            Self::Transport { .. } => true,
        }
    }

    /// HTTP status reported by the platform, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Model(#[from] SharedError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A uniqueness rule was violated in a way the caller must handle
    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl StoreError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

/// Errors raised by the Sync Worker and the Channel-Access engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid payload or configuration; not retried
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A row the operation depends on does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// No adapter is registered under the provider name
    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn provider_not_supported(provider: impl Into<String>) -> Self {
        Self::ProviderNotSupported {
            provider: provider.into(),
        }
    }

    /// Short label for logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::NotFound { .. } => "not_found",
            Self::ProviderNotSupported { .. } => "provider_not_supported",
            Self::Provider(ProviderError::Configuration { .. }) => "configuration",
            Self::Provider(_) => "api",
            Self::Store(_) => "store",
        }
    }
}

/// Bad payloads are configuration errors; anything else came from a stored row
impl From<SharedError> for SyncError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::PayloadError { .. } | SharedError::ValidationError { .. } => {
                Self::configuration(err.to_string())
            }
            SharedError::SerializationError { .. } => Self::Store(StoreError::Model(err)),
        }
    }
}
