//! Channel-Access HTTP Handlers
//!
//! Thin RPC entry points the CRUD layer calls after a membership or channel
//! mutation commits.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::ChannelAccessEngine;
use crate::backend::error::BackendError;
use crate::backend::store::AccessDiff;

/// Recompute a channel and its thread children
pub async fn sync_channel(
    State(engine): State<Arc<ChannelAccessEngine>>,
    Path(channel_id): Path<Uuid>,
) -> Result<Json<AccessDiff>, BackendError> {
    let diff = engine.sync_channel_and_threads(channel_id).await?;
    Ok(Json(diff))
}

/// Recompute one user's channels within an organization
pub async fn sync_user_in_organization(
    State(engine): State<Arc<ChannelAccessEngine>>,
    Path((organization_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AccessDiff>, BackendError> {
    let diff = engine
        .sync_user_in_organization(user_id, organization_id)
        .await?;
    Ok(Json(diff))
}
