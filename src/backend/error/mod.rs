//! Backend Error Module
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports
//! ├── sync.rs       - ProviderError, StoreError, SyncError
//! ├── types.rs      - BackendError (HTTP-facing)
//! └── conversion.rs - IntoResponse for BackendError
//! ```

/// Pipeline error types
pub mod sync;

/// HTTP-facing error type
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use sync::{is_retryable_status, ProviderError, StoreError, SyncError};
pub use types::BackendError;
