/**
 * Sync Routes
 *
 * ## Change capture
 * - `POST /webhooks/cdc` - Change-capture batch
 *
 * ## Outbound
 * - `POST /sync/connections/{id}/outbound/messages/{message_id}` - Mirror one message
 * - `POST /sync/connections/{id}/backfill` - Mirror every unlinked message
 *
 * ## Inbound
 * - `POST /sync/connections/{id}/inbound/messages`
 * - `POST /sync/connections/{id}/inbound/messages/update`
 * - `POST /sync/connections/{id}/inbound/messages/delete`
 * - `POST /sync/connections/{id}/inbound/reactions`
 * - `POST /sync/connections/{id}/inbound/reactions/remove`
 * - `POST /sync/connections/{id}/inbound/threads`
 */

use axum::{routing::post, Router};

#[cfg(feature = "ssr")]
use crate::backend::chat_sync::handlers::{
    backfill_connection, ingest_message, ingest_message_delete, ingest_message_update,
    ingest_reaction, ingest_reaction_remove, ingest_thread, sync_outbound_message,
};
#[cfg(feature = "ssr")]
use crate::backend::sequencer::handlers::receive_changes;
#[cfg(feature = "ssr")]
use crate::backend::server::state::AppState;

#[cfg(feature = "ssr")]
pub fn configure_sync_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/webhooks/cdc", post(receive_changes))
        .route(
            "/sync/connections/{id}/outbound/messages/{message_id}",
            post(sync_outbound_message),
        )
        .route("/sync/connections/{id}/backfill", post(backfill_connection))
        .route("/sync/connections/{id}/inbound/messages", post(ingest_message))
        .route(
            "/sync/connections/{id}/inbound/messages/update",
            post(ingest_message_update),
        )
        .route(
            "/sync/connections/{id}/inbound/messages/delete",
            post(ingest_message_delete),
        )
        .route("/sync/connections/{id}/inbound/reactions", post(ingest_reaction))
        .route(
            "/sync/connections/{id}/inbound/reactions/remove",
            post(ingest_reaction_remove),
        )
        .route("/sync/connections/{id}/inbound/threads", post(ingest_thread))
}
