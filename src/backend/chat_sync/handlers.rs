//! Chat Sync HTTP Handlers
//!
//! RPC entry points for the CRUD layer and for the platform ingress service
//! that forwards gateway events.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{
    ChatSyncWorker, FanOutSummary, InboundMessage, InboundMessageDelete, InboundMessageUpdate,
    InboundReaction, InboundThread, OutcomeBody,
};
use crate::backend::error::BackendError;

/// Mirror one internal message to one connection
pub async fn sync_outbound_message(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path((sync_connection_id, message_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .sync_message_create(sync_connection_id, message_id, None)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn backfill_connection(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
) -> Result<Json<FanOutSummary>, BackendError> {
    let summary = worker.backfill_connection(sync_connection_id).await?;
    Ok(Json(summary))
}

pub async fn ingest_message(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundMessage>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .ingest_message_create(sync_connection_id, event)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn ingest_message_update(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundMessageUpdate>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .ingest_message_update(sync_connection_id, event)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn ingest_message_delete(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundMessageDelete>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .ingest_message_delete(sync_connection_id, event)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn ingest_reaction(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundReaction>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker.ingest_reaction_add(sync_connection_id, event).await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn ingest_reaction_remove(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundReaction>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .ingest_reaction_remove(sync_connection_id, event)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}

pub async fn ingest_thread(
    State(worker): State<Arc<ChatSyncWorker>>,
    Path(sync_connection_id): Path<Uuid>,
    Json(event): Json<InboundThread>,
) -> Result<Json<OutcomeBody>, BackendError> {
    let outcome = worker
        .ingest_thread_create(sync_connection_id, event)
        .await?;
    Ok(Json(OutcomeBody::from(&outcome)))
}
