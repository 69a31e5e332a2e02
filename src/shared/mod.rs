//! Shared Types
//!
//! Types used by both the synchronization backend and any caller that only
//! needs the data model (for example a CRUD service building change events or
//! reading channel links). Nothing in here touches the database or network.

/// Synchronization data model
pub mod models;

/// Change-capture webhook payload types
pub mod change_event;

/// Shared error types
pub mod error;

/// Service configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use change_event::{ChangeAction, ChangeBatch, ChangeEvent, ChangeMetadata};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::SharedError;
