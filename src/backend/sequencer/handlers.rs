//! Change-capture webhook.
//!
//! `POST /webhooks/cdc` accepts `{ "data": [ChangeEvent, ..] }`. When
//! `cdc_webhook_secret` is configured the request must carry
//! `Authorization: Bearer <secret>`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};

use super::{BatchOutcome, ChangeDispatcher};
use crate::backend::error::BackendError;
use crate::shared::change_event::ChangeBatch;
use crate::shared::config::SyncConfig;

fn check_secret(headers: &HeaderMap, secret: Option<&str>) -> Result<(), BackendError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == secret => Ok(()),
        Some(_) => Err(BackendError::unauthorized("invalid webhook secret")),
        None => Err(BackendError::unauthorized("missing bearer secret")),
    }
}

pub async fn receive_changes(
    State(dispatcher): State<Arc<ChangeDispatcher>>,
    State(config): State<Arc<SyncConfig>>,
    headers: HeaderMap,
    Json(batch): Json<ChangeBatch>,
) -> Result<Json<BatchOutcome>, BackendError> {
    check_secret(&headers, config.cdc_webhook_secret.as_deref())?;
    let outcome = dispatcher.process_batch(batch).await;
    Ok(Json(outcome))
}
