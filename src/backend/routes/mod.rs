//! Route Configuration Module
//!
//! - **`router`** - Main router creation and route assembly
//! - **`sync_routes`** - Change-capture webhook, outbound / inbound sync, backfill
//! - **`access_routes`** - Channel-access recomputation
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs            - Module exports
//! ├── router.rs         - Main router creation
//! ├── sync_routes.rs    - Sync endpoints
//! └── access_routes.rs  - Channel-access endpoints
//! ```

/// Main router creation
pub mod router;

/// Sync endpoints
pub mod sync_routes;

/// Channel-access endpoints
pub mod access_routes;

#[cfg(feature = "ssr")]
pub use router::create_router;
