//! Backend Module
//!
//! Server-side chat synchronization subsystem. Only compiled with the `ssr`
//! feature.
//!
//! # Overview
//!
//! - **`sequencer`** - Replays change-capture batches in commit order and
//!   dispatches each event
//! - **`chat_sync`** - The Sync Worker: outbound and inbound mirroring with
//!   receipt-based dedupe, fan-out and backfill
//! - **`provider`** - Provider Adapter trait, registry, retry policy and the
//!   Discord adapter
//! - **`channel_access`** - Channel-Access Propagation Engine
//! - **`store`** - Persistence traits with Postgres and in-memory implementations
//! - **`server`** / **`routes`** - Axum wiring
//! - **`error`** - Error types and HTTP conversion
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs           - Module exports and documentation
//! ├── server/          - Component wiring and state
//! ├── routes/          - Route configuration
//! ├── sequencer/       - Commit-order sequencer, change dispatcher
//! ├── chat_sync/       - Sync Worker
//! ├── provider/        - Provider adapters
//! ├── channel_access/  - Visibility index maintenance
//! ├── store/           - Persistence
//! └── error/           - Error types
//! ```
//!
//! # Data Flow
//!
//! ```text
//! replication stream ──> /webhooks/cdc ──> sequencer ──┬─> chat_sync ──> provider ──> platform
//!                                                      └─> channel_access
//! platform ingress ────> /sync/connections/{id}/inbound/* ──> chat_sync ──> store
//! ```

/// Server setup and configuration
#[cfg(feature = "ssr")]
pub mod server;

/// Route configuration
#[cfg(feature = "ssr")]
pub mod routes;

/// Backend error types
#[cfg(feature = "ssr")]
pub mod error;

/// Persistence traits and implementations
#[cfg(feature = "ssr")]
pub mod store;

/// Provider adapters
#[cfg(feature = "ssr")]
pub mod provider;

/// Sync Worker
#[cfg(feature = "ssr")]
pub mod chat_sync;

/// Channel-Access Propagation Engine
#[cfg(feature = "ssr")]
pub mod channel_access;

/// Commit-order sequencer
#[cfg(feature = "ssr")]
pub mod sequencer;

/// Re-export commonly used types
#[cfg(feature = "ssr")]
pub use channel_access::ChannelAccessEngine;
#[cfg(feature = "ssr")]
pub use chat_sync::{ChatSyncWorker, SyncOutcome};
#[cfg(feature = "ssr")]
pub use error::BackendError;
#[cfg(feature = "ssr")]
pub use sequencer::ChangeDispatcher;
#[cfg(feature = "ssr")]
pub use server::create_app;
