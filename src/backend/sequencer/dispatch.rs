/**
 * Change Dispatcher
 *
 * Routes each change-capture event to the component that reacts to its table:
 *
 * - `messages` - outbound create / update / delete fan-out per provider
 *   (an update that sets `deleted_at` is a delete)
 * - `message_reactions` - outbound reaction add / remove fan-out
 * - `channels` - channel access for the channel and its threads; new threads
 *   are also offered to the providers
 * - `channel_members` - channel access for the member's channel and its threads
 * - `organization_members` - channel access for the member across the organization
 *
 * Sync calls carry the event's own dedupe key, so a redelivered batch is
 * absorbed by the receipt ledger.
 */

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::processor::{process_in_commit_order, BatchOutcome, ChangeHandler};
use crate::backend::channel_access::ChannelAccessEngine;
use crate::backend::chat_sync::{ChatSyncWorker, FanOutSummary};
use crate::backend::error::SyncError;
use crate::shared::change_event::{ChangeAction, ChangeBatch, ChangeEvent};
use crate::shared::error::SharedError;
use crate::shared::models::{ChannelType, ReactionSnapshot};

pub struct ChangeDispatcher {
    worker: Arc<ChatSyncWorker>,
    access: Arc<ChannelAccessEngine>,
}

fn required_uuid(event: &ChangeEvent, field: &str) -> Result<Uuid, SyncError> {
    event.uuid_field(field).ok_or_else(|| {
        SharedError::payload(
            event.table(),
            format!("record {} has no valid {}", event.record_id(), field),
        )
        .into()
    })
}

impl ChangeDispatcher {
    pub fn new(worker: Arc<ChatSyncWorker>, access: Arc<ChannelAccessEngine>) -> Self {
        Self { worker, access }
    }

    pub async fn process_batch(&self, batch: ChangeBatch) -> BatchOutcome {
        tracing::info!("[Sequencer] Received batch of {} events", batch.data.len());
        process_in_commit_order(batch.data, self).await
    }

    async fn handle_message(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let message_id = required_uuid(event, "id")?;
        let key = Some(event.dedupe_key());
        let deleted = event.action == ChangeAction::Delete || event.has_value("deleted_at");

        for provider in self.worker.providers().providers() {
            let summary = match event.action {
                ChangeAction::Insert => {
                    self.worker
                        .sync_message_create_to_all_connections(&provider, message_id, key.clone())
                        .await?
                }
                _ if deleted => {
                    let channel_id = required_uuid(event, "channel_id")?;
                    self.worker
                        .sync_message_delete_to_all_connections(
                            &provider,
                            message_id,
                            channel_id,
                            key.clone(),
                        )
                        .await?
                }
                _ => {
                    self.worker
                        .sync_message_update_to_all_connections(&provider, message_id, key.clone())
                        .await?
                }
            };
            log_summary(event, &provider, summary);
        }
        Ok(())
    }

    async fn handle_reaction(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let key = Some(event.dedupe_key());

        for provider in self.worker.providers().providers() {
            let summary = match event.action {
                ChangeAction::Insert => {
                    let reaction_id = required_uuid(event, "id")?;
                    self.worker
                        .sync_reaction_create_to_all_connections(&provider, reaction_id, key.clone())
                        .await?
                }
                ChangeAction::Delete => {
                    let snapshot = ReactionSnapshot {
                        message_id: required_uuid(event, "message_id")?,
                        user_id: required_uuid(event, "user_id")?,
                        emoji: event
                            .str_field("emoji")
                            .ok_or_else(|| SharedError::payload(event.table(), "missing emoji"))?
                            .to_string(),
                    };
                    let channel_id = required_uuid(event, "channel_id")?;
                    self.worker
                        .sync_reaction_delete_to_all_connections(
                            &provider,
                            snapshot,
                            channel_id,
                            key.clone(),
                        )
                        .await?
                }
                // Reactions are never edited in place
                ChangeAction::Update => return Ok(()),
            };
            log_summary(event, &provider, summary);
        }
        Ok(())
    }

    async fn handle_channel(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let channel_id = required_uuid(event, "id")?;
        let diff = self.access.sync_channel_and_threads(channel_id).await?;
        tracing::debug!(
            "[Sequencer] Channel {} access: +{} -{}",
            channel_id,
            diff.inserted,
            diff.deleted
        );

        let is_thread = event.str_field("type") == Some(ChannelType::Thread.as_str());
        if event.action == ChangeAction::Insert && is_thread {
            let key = Some(event.dedupe_key());
            for provider in self.worker.providers().providers() {
                let summary = self
                    .worker
                    .sync_thread_create_to_all_connections(&provider, channel_id, key.clone())
                    .await?;
                log_summary(event, &provider, summary);
            }
        }
        Ok(())
    }

    async fn handle_channel_member(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let channel_id = required_uuid(event, "channel_id")?;
        self.access.sync_channel_and_threads(channel_id).await?;
        Ok(())
    }

    async fn handle_organization_member(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let user_id = required_uuid(event, "user_id")?;
        let organization_id = required_uuid(event, "organization_id")?;
        self.access
            .sync_user_in_organization(user_id, organization_id)
            .await?;
        Ok(())
    }
}

fn log_summary(event: &ChangeEvent, provider: &str, summary: FanOutSummary) {
    if summary.total() == 0 {
        return;
    }
    tracing::debug!(
        "[Sequencer] {} {} via {}: {} synced, {} failed, {} skipped",
        event.table(),
        event.action.as_str(),
        provider,
        summary.synced,
        summary.failed,
        summary.skipped
    );
}

#[async_trait]
impl ChangeHandler for ChangeDispatcher {
    async fn handle(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        match event.table() {
            "messages" => self.handle_message(event).await,
            "message_reactions" => self.handle_reaction(event).await,
            "channels" => self.handle_channel(event).await,
            "channel_members" => self.handle_channel_member(event).await,
            "organization_members" => self.handle_organization_member(event).await,
            other => {
                tracing::debug!("[Sequencer] Ignoring change on table {}", other);
                Ok(())
            }
        }
    }
}
