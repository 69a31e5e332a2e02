//! Inbound sync: external platform events written into the internal store.
//!
//! Every event claims its receipt under `source = external`, resolves the
//! channel link from the external channel id and fails when none exists.
//! Updates, deletes and reactions for messages that were never mirrored
//! settle as `ignored`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::outcome::{IgnoreReason, SyncOutcome};
use super::{dedupe, receipt_claim, ChatSyncWorker, Settled};
use crate::backend::error::SyncError;
use crate::shared::models::{
    ChannelLink, ChannelLinkSettings, EventSource, MessageOrigin, NewChannelLink, NewMessage,
    NewMessageLink, NewThreadChannel, ReactionSnapshot, SyncConnection,
};

/// Platform account behind an inbound message or reaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAuthor {
    pub external_user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub external_channel_id: String,
    pub external_message_id: String,
    pub content: String,
    pub author: ExternalAuthor,
    #[serde(default)]
    pub reply_to_external_message_id: Option<String>,
    /// Set when the platform reports the message was posted by a webhook
    #[serde(default)]
    pub external_webhook_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessageUpdate {
    pub external_channel_id: String,
    pub external_message_id: String,
    pub content: String,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_webhook_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessageDelete {
    pub external_channel_id: String,
    pub external_message_id: String,
    #[serde(default, skip_serializing)]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundReaction {
    pub external_channel_id: String,
    pub external_message_id: String,
    pub user: ExternalAuthor,
    pub emoji: String,
    #[serde(default, skip_serializing)]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InboundThread {
    pub external_parent_channel_id: String,
    pub external_thread_id: String,
    /// Message in the parent channel the thread was started from
    pub external_root_message_id: String,
    pub name: String,
    #[serde(default, skip_serializing)]
    pub dedupe_key: Option<String>,
}

/// Whether the event was posted by the link's own outbound webhook
fn is_own_webhook(link: &ChannelLink, external_webhook_id: Option<&str>) -> bool {
    match (link.settings.webhook(), external_webhook_id) {
        (Some(identity), Some(webhook_id)) => identity.webhook_id == webhook_id,
        _ => false,
    }
}

fn update_revision(update: &InboundMessageUpdate) -> String {
    match update.edited_at {
        Some(edited_at) => edited_at.timestamp_millis().to_string(),
        None => dedupe::payload_hash(&update.content)
            .map(|hash| hash[..16].to_string())
            .unwrap_or_default(),
    }
}

impl ChatSyncWorker {
    /// Live link for an external channel; inbound events for unlinked channels are an error
    async fn inbound_link(
        &self,
        connection: &SyncConnection,
        external_channel_id: &str,
    ) -> Result<ChannelLink, SyncError> {
        self.links
            .find_channel_link_by_external_channel(connection.id, external_channel_id)
            .await?
            .ok_or_else(|| SyncError::not_found("channel link", external_channel_id))
    }

    pub async fn ingest_message_create(
        &self,
        sync_connection_id: Uuid,
        event: InboundMessage,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event
            .dedupe_key
            .clone()
            .unwrap_or_else(|| dedupe::external_message_create(&event.external_message_id));
        let payload = json!({ "operation": "message.create", "event": event });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let link = self
                .inbound_link(&connection, &event.external_channel_id)
                .await?;
            // Our own webhook posts come back through the gateway
            if is_own_webhook(&link, event.external_webhook_id.as_deref()) {
                return Ok(Settled::ignored(IgnoreReason::WebhookOrigin, Some(link.id)));
            }
            if !link.direction.allows_inbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
            }
            if self
                .links
                .find_message_link_by_external_message(link.id, &event.external_message_id)
                .await?
                .is_some()
            {
                return Ok(Settled::new(SyncOutcome::AlreadyLinked, Some(link.id)));
            }

            let author_id = self.resolve_author(&connection, &event.author).await?;
            let reply_to_message_id = match &event.reply_to_external_message_id {
                Some(reply_to) => self
                    .links
                    .find_message_link_by_external_message(link.id, reply_to)
                    .await?
                    .map(|target| target.hazel_message_id),
                None => None,
            };

            let message = self
                .chat
                .insert_message(NewMessage {
                    channel_id: link.hazel_channel_id,
                    author_id,
                    content: event.content.clone(),
                    reply_to_message_id,
                })
                .await?;

            let (root_hazel_message_id, root_external_message_id) =
                self.thread_roots(&link).await?;
            let message_link = self
                .links
                .insert_message_link(NewMessageLink {
                    channel_link_id: link.id,
                    hazel_message_id: message.id,
                    external_message_id: event.external_message_id.clone(),
                    origin: MessageOrigin::External,
                    root_hazel_message_id,
                    root_external_message_id,
                })
                .await?;
            self.touch(connection.id, link.id, None).await?;

            Ok(Settled::new(
                SyncOutcome::synced(message_link.hazel_message_id, message_link.external_message_id),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "inbound message create",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            body,
        )
        .await
    }

    pub async fn ingest_message_update(
        &self,
        sync_connection_id: Uuid,
        event: InboundMessageUpdate,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event.dedupe_key.clone().unwrap_or_else(|| {
            dedupe::external_message_update(&event.external_message_id, &update_revision(&event))
        });
        let payload = json!({ "operation": "message.update", "event": event });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let link = self
                .inbound_link(&connection, &event.external_channel_id)
                .await?;
            if is_own_webhook(&link, event.external_webhook_id.as_deref()) {
                return Ok(Settled::ignored(IgnoreReason::WebhookOrigin, Some(link.id)));
            }
            if !link.direction.allows_inbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
            }
            let Some(message_link) = self
                .links
                .find_message_link_by_external_message(link.id, &event.external_message_id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
            };

            let edited_at = event.edited_at.unwrap_or_else(Utc::now);
            self.chat
                .update_message_content(message_link.hazel_message_id, &event.content, edited_at)
                .await?;
            self.touch(connection.id, link.id, Some(message_link.id))
                .await?;

            Ok(Settled::new(
                SyncOutcome::synced(message_link.hazel_message_id, message_link.external_message_id),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "inbound message update",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            body,
        )
        .await
    }

    pub async fn ingest_message_delete(
        &self,
        sync_connection_id: Uuid,
        event: InboundMessageDelete,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event
            .dedupe_key
            .clone()
            .unwrap_or_else(|| dedupe::external_message_delete(&event.external_message_id));
        let payload = json!({ "operation": "message.delete", "event": event });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let link = self
                .inbound_link(&connection, &event.external_channel_id)
                .await?;
            if !link.direction.allows_inbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
            }
            let Some(message_link) = self
                .links
                .find_message_link_by_external_message(link.id, &event.external_message_id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
            };

            let now = Utc::now();
            self.chat
                .soft_delete_message(message_link.hazel_message_id, now)
                .await?;
            self.links
                .soft_delete_message_link(message_link.id, now)
                .await?;
            self.touch(connection.id, link.id, None).await?;

            Ok(Settled::new(
                SyncOutcome::synced(message_link.hazel_message_id, message_link.external_message_id),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "inbound message delete",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            body,
        )
        .await
    }

    pub async fn ingest_reaction_add(
        &self,
        sync_connection_id: Uuid,
        event: InboundReaction,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event.dedupe_key.clone().unwrap_or_else(|| {
            dedupe::external_reaction_add(
                &event.external_message_id,
                &event.user.external_user_id,
                &event.emoji,
            )
        });
        let payload = json!({ "operation": "reaction.add", "event": event });

        self.run_claimed(
            "inbound reaction add",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            self.reaction_event_body(sync_connection_id, &event, true),
        )
        .await
    }

    pub async fn ingest_reaction_remove(
        &self,
        sync_connection_id: Uuid,
        event: InboundReaction,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event.dedupe_key.clone().unwrap_or_else(|| {
            dedupe::external_reaction_remove(
                &event.external_message_id,
                &event.user.external_user_id,
                &event.emoji,
            )
        });
        let payload = json!({ "operation": "reaction.remove", "event": event });

        self.run_claimed(
            "inbound reaction remove",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            self.reaction_event_body(sync_connection_id, &event, false),
        )
        .await
    }

    async fn reaction_event_body(
        &self,
        sync_connection_id: Uuid,
        event: &InboundReaction,
        add: bool,
    ) -> Result<Settled, SyncError> {
        let connection = self.load_connection(sync_connection_id).await?;
        if !connection.is_active() {
            return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
        }
        let link = self
            .inbound_link(&connection, &event.external_channel_id)
            .await?;
        if !link.direction.allows_inbound() {
            return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
        }
        let Some(message_link) = self
            .links
            .find_message_link_by_external_message(link.id, &event.external_message_id)
            .await?
        else {
            return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
        };

        let user_id = self.resolve_author(&connection, &event.user).await?;
        let reaction = ReactionSnapshot {
            message_id: message_link.hazel_message_id,
            user_id,
            emoji: event.emoji.clone(),
        };
        if add {
            self.chat.insert_reaction(reaction).await?;
        } else if !self.chat.delete_reaction(&reaction).await? {
            tracing::debug!(
                "[ChatSync] No reaction {} by {} on message {} to remove",
                reaction.emoji,
                user_id,
                reaction.message_id
            );
        }
        self.touch(connection.id, link.id, None).await?;

        Ok(Settled::new(
            SyncOutcome::synced(message_link.hazel_message_id, message_link.external_message_id),
            Some(link.id),
        ))
    }

    pub async fn ingest_thread_create(
        &self,
        sync_connection_id: Uuid,
        event: InboundThread,
    ) -> Result<SyncOutcome, SyncError> {
        let key = event
            .dedupe_key
            .clone()
            .unwrap_or_else(|| dedupe::external_thread_create(&event.external_thread_id));
        let payload = json!({ "operation": "thread.create", "event": event });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let parent_link = self
                .inbound_link(&connection, &event.external_parent_channel_id)
                .await?;
            if parent_link.settings.is_thread_link() {
                return Err(SyncError::configuration(format!(
                    "external channel {} is itself a thread",
                    event.external_parent_channel_id
                )));
            }
            if !parent_link.direction.allows_inbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(parent_link.id)));
            }
            if let Some(existing) = self
                .links
                .find_channel_link_by_external_channel(connection.id, &event.external_thread_id)
                .await?
            {
                return Ok(Settled::new(SyncOutcome::AlreadyLinked, Some(existing.id)));
            }
            let Some(root_link) = self
                .links
                .find_message_link_by_external_message(
                    parent_link.id,
                    &event.external_root_message_id,
                )
                .await?
            else {
                return Ok(Settled::ignored(
                    IgnoreReason::NoMessageLink,
                    Some(parent_link.id),
                ));
            };

            let parent = self
                .chat
                .find_channel(parent_link.hazel_channel_id)
                .await?
                .ok_or_else(|| SyncError::not_found("channel", parent_link.hazel_channel_id))?;
            let thread = self
                .chat
                .insert_thread_channel(NewThreadChannel {
                    organization_id: parent.organization_id,
                    parent_channel_id: parent.id,
                    thread_root_message_id: root_link.hazel_message_id,
                    name: event.name.clone(),
                })
                .await?;

            let link = self
                .links
                .insert_channel_link(NewChannelLink {
                    sync_connection_id: connection.id,
                    hazel_channel_id: thread.id,
                    external_channel_id: event.external_thread_id.clone(),
                    external_channel_name: Some(event.name.clone()),
                    direction: parent_link.direction,
                    settings: ChannelLinkSettings {
                        outbound_identity: parent_link.settings.outbound_identity.clone(),
                        external_parent_channel_id: Some(parent_link.external_channel_id.clone()),
                    },
                })
                .await?;
            if link.hazel_channel_id != thread.id {
                tracing::warn!(
                    "[ChatSync] External thread {} was linked concurrently; thread channel {} left unlinked",
                    event.external_thread_id,
                    thread.id
                );
            }

            self.access.sync_channel(link.hazel_channel_id).await?;
            self.touch(connection.id, link.id, None).await?;

            Ok(Settled::new(
                SyncOutcome::synced(link.hazel_channel_id, link.external_channel_id.clone()),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "inbound thread create",
            receipt_claim(sync_connection_id, EventSource::External, key, &payload),
            body,
        )
        .await
    }
}
