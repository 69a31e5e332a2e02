//! Channel-Access Module
//!
//! # Module Structure
//!
//! ```text
//! channel_access/
//! ├── mod.rs       - Module exports
//! ├── engine.rs    - ChannelAccessEngine (visibility recomputation)
//! └── handlers.rs  - HTTP entry points
//! ```

/// Visibility recomputation
pub mod engine;

/// HTTP handlers
pub mod handlers;

pub use engine::ChannelAccessEngine;
