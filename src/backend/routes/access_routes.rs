/**
 * Channel-Access Routes
 *
 * - `POST /channel-access/channels/{channel_id}/sync` - Recompute a channel and its threads
 * - `POST /channel-access/organizations/{org_id}/users/{user_id}/sync` - Recompute one member
 */

use axum::{routing::post, Router};

#[cfg(feature = "ssr")]
use crate::backend::channel_access::handlers::{sync_channel, sync_user_in_organization};
#[cfg(feature = "ssr")]
use crate::backend::server::state::AppState;

#[cfg(feature = "ssr")]
pub fn configure_access_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/channel-access/channels/{channel_id}/sync", post(sync_channel))
        .route(
            "/channel-access/organizations/{org_id}/users/{user_id}/sync",
            post(sync_user_in_organization),
        )
}
