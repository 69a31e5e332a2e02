//! Hazel Sync - Main Library
//!
//! Cross-platform chat synchronization for a team-chat product: change-capture
//! events from the primary datastore are replayed in commit order, mirrored to
//! external chat platforms (and back) exactly once, and a per-user channel
//! visibility index is kept consistent as membership and channel topology
//! change.
//!
//! # Module Structure
//!
//! - **`shared`** - Data model, change-capture payloads, configuration, errors
//! - **`backend`** - Server-side pipeline (only compiled with the `ssr` feature)
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - Axum server, stores, provider adapters
//!
//! # Usage
//!
//! ```rust,no_run
//! use hazel_sync::backend::server::init::create_app;
//! use hazel_sync::shared::config::SyncConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::from_env()?;
//! let app = create_app(config).await;
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
