//! `…_to_all_connections` variants.
//!
//! Targets are every active connection of a provider holding a live,
//! outbound-capable link for the channel. Thread channels also target the
//! connections linked to their parent, since the thread link may not exist
//! yet. Per-target failures are logged and counted, never propagated.

use std::collections::BTreeSet;
use std::future::Future;

use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use super::outcome::{FanOutSummary, SyncOutcome};
use super::ChatSyncWorker;
use crate::backend::error::SyncError;
use crate::shared::models::{ChannelType, ReactionSnapshot};

impl ChatSyncWorker {
    /// Connection ids to fan out to for an internal channel
    pub(crate) async fn fanout_targets(
        &self,
        provider: &str,
        hazel_channel_id: Uuid,
    ) -> Result<Vec<Uuid>, SyncError> {
        let mut targets: BTreeSet<Uuid> = self
            .links
            .find_channel_links_for_hazel_channel(hazel_channel_id, provider)
            .await?
            .into_iter()
            .filter(|link| link.direction.allows_outbound())
            .map(|link| link.sync_connection_id)
            .collect();

        if let Some(channel) = self.chat.find_channel(hazel_channel_id).await? {
            if let (ChannelType::Thread, Some(parent_id)) =
                (channel.channel_type, channel.parent_channel_id)
            {
                let parent_links = self
                    .links
                    .find_channel_links_for_hazel_channel(parent_id, provider)
                    .await?;
                targets.extend(
                    parent_links
                        .into_iter()
                        .filter(|link| {
                            link.direction.allows_outbound() && !link.settings.is_thread_link()
                        })
                        .map(|link| link.sync_connection_id),
                );
            }
        }

        Ok(targets.into_iter().collect())
    }

    /// Run `operation` for each target with bounded concurrency and tally the outcomes
    async fn fan_out<F, Fut>(&self, operation: &str, targets: Vec<Uuid>, run: F) -> FanOutSummary
    where
        F: Fn(Uuid) -> Fut,
        Fut: Future<Output = Result<SyncOutcome, SyncError>>,
    {
        let results: Vec<(Uuid, Result<SyncOutcome, SyncError>)> = stream::iter(targets)
            .map(|connection_id| {
                let pending = run(connection_id);
                async move { (connection_id, pending.await) }
            })
            .buffer_unordered(self.fanout_concurrency)
            .collect()
            .await;

        let mut summary = FanOutSummary::default();
        for (connection_id, result) in results {
            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    tracing::warn!(
                        "[ChatSync] {} fan-out to connection {} failed: {}",
                        operation,
                        connection_id,
                        err
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    pub async fn sync_message_create_to_all_connections(
        &self,
        provider: &str,
        message_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let message = self
            .chat
            .find_message(message_id)
            .await?
            .ok_or_else(|| SyncError::not_found("message", message_id))?;
        let targets = self.fanout_targets(provider, message.channel_id).await?;

        Ok(self
            .fan_out("message create", targets, |connection_id| {
                self.sync_message_create(connection_id, message_id, dedupe_key.clone())
            })
            .await)
    }

    pub async fn sync_message_update_to_all_connections(
        &self,
        provider: &str,
        message_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let message = self
            .chat
            .find_message(message_id)
            .await?
            .ok_or_else(|| SyncError::not_found("message", message_id))?;
        let targets = self.fanout_targets(provider, message.channel_id).await?;

        Ok(self
            .fan_out("message update", targets, |connection_id| {
                self.sync_message_update(connection_id, message_id, dedupe_key.clone())
            })
            .await)
    }

    pub async fn sync_message_delete_to_all_connections(
        &self,
        provider: &str,
        message_id: Uuid,
        hazel_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let targets = self.fanout_targets(provider, hazel_channel_id).await?;

        Ok(self
            .fan_out("message delete", targets, |connection_id| {
                self.sync_message_delete(
                    connection_id,
                    message_id,
                    hazel_channel_id,
                    dedupe_key.clone(),
                )
            })
            .await)
    }

    pub async fn sync_reaction_create_to_all_connections(
        &self,
        provider: &str,
        reaction_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let reaction = self
            .chat
            .find_reaction(reaction_id)
            .await?
            .ok_or_else(|| SyncError::not_found("reaction", reaction_id))?;
        let targets = self.fanout_targets(provider, reaction.channel_id).await?;

        Ok(self
            .fan_out("reaction create", targets, |connection_id| {
                self.sync_reaction_create(connection_id, reaction_id, dedupe_key.clone())
            })
            .await)
    }

    pub async fn sync_reaction_delete_to_all_connections(
        &self,
        provider: &str,
        reaction: ReactionSnapshot,
        hazel_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let targets = self.fanout_targets(provider, hazel_channel_id).await?;

        Ok(self
            .fan_out("reaction delete", targets, |connection_id| {
                self.sync_reaction_delete(
                    connection_id,
                    reaction.clone(),
                    hazel_channel_id,
                    dedupe_key.clone(),
                )
            })
            .await)
    }

    pub async fn sync_thread_create_to_all_connections(
        &self,
        provider: &str,
        thread_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<FanOutSummary, SyncError> {
        let targets = self.fanout_targets(provider, thread_channel_id).await?;

        Ok(self
            .fan_out("thread create", targets, |connection_id| {
                self.sync_thread_create(connection_id, thread_channel_id, dedupe_key.clone())
            })
            .await)
    }
}
