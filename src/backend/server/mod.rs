//! Server Module
//!
//! Server-side setup for the sync service.
//!
//! - **`state`** - `AppState` and `FromRef` implementations
//! - **`config`** - Database pool loading
//! - **`init`** - Component wiring and app creation
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Database loading
//! └── init.rs         - Component wiring and app creation
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

#[cfg(feature = "ssr")]
pub use init::{build_state, create_app, default_providers};
#[cfg(feature = "ssr")]
pub use state::AppState;
