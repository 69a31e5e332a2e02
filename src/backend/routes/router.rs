/**
 * Router Configuration
 *
 * Combines the route groups into one Axum router:
 *
 * 1. Health check
 * 2. Sync routes (change-capture webhook, outbound, inbound, backfill)
 * 3. Channel-access routes
 * 4. Fallback handler (404)
 *
 * Every request is traced through `tower_http::trace::TraceLayer`.
 */

use axum::{http::StatusCode, Json, Router};
use tower_http::trace::TraceLayer;

#[cfg(feature = "ssr")]
use crate::backend::routes::access_routes::configure_access_routes;
#[cfg(feature = "ssr")]
use crate::backend::routes::sync_routes::configure_sync_routes;
#[cfg(feature = "ssr")]
use crate::backend::server::state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not Found", "status": 404 })),
    )
}

/// Create the Axum router with all routes configured
#[cfg(feature = "ssr")]
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new().route("/health", axum::routing::get(health));

    let router = configure_sync_routes(router);
    let router = configure_access_routes(router);

    router
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
