//! Outbound sync: internal messages, reactions and threads mirrored to one
//! connection's external platform.
//!
//! Every operation takes an optional caller-supplied dedupe key (the
//! change-capture dispatcher passes its own); otherwise a deterministic key is
//! built from the entity ids.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::channel_links::delivery_channel_id;
use super::identity::{is_shadow_user, shadow_external_user_id};
use super::outcome::{IgnoreReason, SyncOutcome};
use super::{dedupe, receipt_claim, ChatSyncWorker, Settled};
use crate::backend::error::SyncError;
use crate::backend::provider::OutboundMessage;
use crate::shared::models::{
    ChannelLink, ChannelType, EventSource, MessageOrigin, NewMessageLink, ReactionSnapshot,
};

impl ChatSyncWorker {
    pub async fn sync_message_create(
        &self,
        sync_connection_id: Uuid,
        message_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        let key = dedupe_key.unwrap_or_else(|| dedupe::message_create(message_id));
        let payload = json!({ "operation": "message.create", "messageId": message_id });
        self.run_claimed(
            "message create",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            self.message_create_body(sync_connection_id, message_id),
        )
        .await
    }

    async fn message_create_body(
        &self,
        sync_connection_id: Uuid,
        message_id: Uuid,
    ) -> Result<Settled, SyncError> {
        let connection = self.load_connection(sync_connection_id).await?;
        if !connection.is_active() {
            return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
        }
        let message = self
            .chat
            .find_message(message_id)
            .await?
            .ok_or_else(|| SyncError::not_found("message", message_id))?;

        let link = self
            .resolve_outbound_link(&connection, message.channel_id)
            .await?
            .ok_or_else(|| SyncError::not_found("channel link", message.channel_id))?;
        if !link.direction.allows_outbound() {
            return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
        }

        // Replays, and messages that came in from the external side
        if self
            .links
            .find_message_link_by_hazel_message(link.id, message.id)
            .await?
            .is_some()
        {
            return Ok(Settled::new(SyncOutcome::AlreadyLinked, Some(link.id)));
        }
        // Inbound writes land before their message link does
        let author = self.directory.find_user(message.author_id).await?;
        if author
            .as_ref()
            .is_some_and(|user| is_shadow_user(&connection.provider, user))
            && !self
                .mirrored_in_elsewhere(&connection.provider, &link, message.id)
                .await?
        {
            return Ok(Settled::ignored(IgnoreReason::ExternalOrigin, Some(link.id)));
        }

        let reply_to = self.resolve_reply_target(&link, &message).await?;
        let webhook = self.webhook_delivery(&link, Some(message.author_id)).await?;
        let adapter = self.providers.get(&connection.provider)?;

        let outbound = OutboundMessage {
            channel_id: delivery_channel_id(&link, webhook.as_ref()),
            content: message.content.clone(),
            reply_to_message_id: reply_to,
            webhook,
        };
        let external_message_id = adapter.create_message(&outbound).await?;

        let (root_hazel_message_id, root_external_message_id) = self.thread_roots(&link).await?;
        let message_link = self
            .links
            .insert_message_link(NewMessageLink {
                channel_link_id: link.id,
                hazel_message_id: message.id,
                external_message_id,
                origin: MessageOrigin::Hazel,
                root_hazel_message_id,
                root_external_message_id,
            })
            .await?;
        self.touch(connection.id, link.id, None).await?;

        Ok(Settled::new(
            SyncOutcome::synced(message.id, message_link.external_message_id),
            Some(link.id),
        ))
    }

    /// Whether another connection's link already holds `message_id` as inbound content.
    /// A shadow-authored message with no such link is still landing on this connection.
    async fn mirrored_in_elsewhere(
        &self,
        provider: &str,
        link: &ChannelLink,
        message_id: Uuid,
    ) -> Result<bool, SyncError> {
        let siblings = self
            .links
            .find_channel_links_for_hazel_channel(link.hazel_channel_id, provider)
            .await?;
        for sibling in siblings.iter().filter(|sibling| sibling.id != link.id) {
            let inbound = self
                .links
                .find_message_link_by_hazel_message(sibling.id, message_id)
                .await?
                .is_some_and(|message_link| message_link.origin == MessageOrigin::External);
            if inbound {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub async fn sync_message_update(
        &self,
        sync_connection_id: Uuid,
        message_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        // The default key carries the edit revision, so only then is the row read up front
        let (key, payload, preloaded) = match dedupe_key {
            Some(key) => {
                let payload = json!({ "operation": "message.update", "messageId": message_id });
                (key, payload, None)
            }
            None => {
                let message = self
                    .chat
                    .find_message(message_id)
                    .await?
                    .ok_or_else(|| SyncError::not_found("message", message_id))?;
                let payload = json!({
                    "operation": "message.update",
                    "messageId": message.id,
                    "content": message.content,
                });
                (
                    dedupe::message_update(message.id, message.updated_at),
                    payload,
                    Some(message),
                )
            }
        };

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let message = match preloaded {
                Some(message) => message,
                None => self
                    .chat
                    .find_message(message_id)
                    .await?
                    .ok_or_else(|| SyncError::not_found("message", message_id))?,
            };
            let Some(link) = self
                .links
                .find_channel_link_by_hazel_channel(connection.id, message.channel_id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, None));
            };
            if !link.direction.allows_outbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
            }
            let Some(message_link) = self
                .links
                .find_message_link_by_hazel_message(link.id, message.id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
            };
            // Only content we posted can be edited on the platform
            if message_link.origin == MessageOrigin::External {
                return Ok(Settled::ignored(IgnoreReason::ExternalOrigin, Some(link.id)));
            }

            let webhook = self.webhook_delivery(&link, Some(message.author_id)).await?;
            let adapter = self.providers.get(&connection.provider)?;
            adapter
                .update_message(
                    &delivery_channel_id(&link, webhook.as_ref()),
                    &message_link.external_message_id,
                    &message.content,
                    webhook.as_ref(),
                )
                .await?;
            self.touch(connection.id, link.id, Some(message_link.id))
                .await?;

            Ok(Settled::new(
                SyncOutcome::synced(message.id, message_link.external_message_id),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "message update",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            body,
        )
        .await
    }

    /// `hazel_channel_id` is passed in because the message row may already be gone
    pub async fn sync_message_delete(
        &self,
        sync_connection_id: Uuid,
        message_id: Uuid,
        hazel_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        let key = dedupe_key.unwrap_or_else(|| dedupe::message_delete(message_id));
        let payload = json!({ "operation": "message.delete", "messageId": message_id });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let Some(link) = self
                .links
                .find_channel_link_by_hazel_channel(connection.id, hazel_channel_id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, None));
            };
            if !link.direction.allows_outbound() {
                return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
            }
            let Some(message_link) = self
                .links
                .find_message_link_by_hazel_message(link.id, message_id)
                .await?
            else {
                return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
            };

            let webhook = match message_link.origin {
                MessageOrigin::Hazel => self.webhook_delivery(&link, None).await?,
                MessageOrigin::External => None,
            };
            let adapter = self.providers.get(&connection.provider)?;
            adapter
                .delete_message(
                    &delivery_channel_id(&link, webhook.as_ref()),
                    &message_link.external_message_id,
                    webhook.as_ref(),
                )
                .await?;

            self.links
                .soft_delete_message_link(message_link.id, Utc::now())
                .await?;
            self.touch(connection.id, link.id, None).await?;

            Ok(Settled::new(
                SyncOutcome::synced(message_id, message_link.external_message_id),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "message delete",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            body,
        )
        .await
    }

    pub async fn sync_reaction_create(
        &self,
        sync_connection_id: Uuid,
        reaction_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        let key = dedupe_key.unwrap_or_else(|| dedupe::reaction_create(reaction_id));
        let payload = json!({ "operation": "reaction.create", "reactionId": reaction_id });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let reaction = self
                .chat
                .find_reaction(reaction_id)
                .await?
                .ok_or_else(|| SyncError::not_found("reaction", reaction_id))?;
            let snapshot = ReactionSnapshot {
                message_id: reaction.message_id,
                user_id: reaction.user_id,
                emoji: reaction.emoji.clone(),
            };
            self.reaction_body(
                connection.id,
                &connection.provider,
                reaction.channel_id,
                &snapshot,
                true,
            )
            .await
                .map(|settled| match settled.outcome {
                    SyncOutcome::Synced { external_id, .. } => Settled::new(
                        SyncOutcome::synced(reaction.id, external_id),
                        settled.channel_link_id,
                    ),
                    _ => settled,
                })
        };

        self.run_claimed(
            "reaction create",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            body,
        )
        .await
    }

    /// The reaction row is usually gone by now, so the caller passes its fields
    pub async fn sync_reaction_delete(
        &self,
        sync_connection_id: Uuid,
        reaction: ReactionSnapshot,
        hazel_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        let key = dedupe_key.unwrap_or_else(|| {
            dedupe::reaction_delete(reaction.message_id, reaction.user_id, &reaction.emoji)
        });
        let payload = json!({ "operation": "reaction.delete", "reaction": reaction });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            self.reaction_body(
                connection.id,
                &connection.provider,
                hazel_channel_id,
                &reaction,
                false,
            )
            .await
        };

        self.run_claimed(
            "reaction delete",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            body,
        )
        .await
    }

    async fn reaction_body(
        &self,
        sync_connection_id: Uuid,
        provider: &str,
        hazel_channel_id: Uuid,
        reaction: &ReactionSnapshot,
        add: bool,
    ) -> Result<Settled, SyncError> {
        let Some(link) = self
            .links
            .find_channel_link_by_hazel_channel(sync_connection_id, hazel_channel_id)
            .await?
        else {
            return Ok(Settled::ignored(IgnoreReason::NoMessageLink, None));
        };
        if !link.direction.allows_outbound() {
            return Ok(Settled::ignored(IgnoreReason::Direction, Some(link.id)));
        }

        let Some(message_link) = self
            .links
            .find_message_link_by_hazel_message(link.id, reaction.message_id)
            .await?
        else {
            return Ok(Settled::ignored(IgnoreReason::NoMessageLink, Some(link.id)));
        };

        // A shadow user's reaction that this connection ingested must not echo back out
        if let Some(user) = self.directory.find_user(reaction.user_id).await? {
            if let Some(external_user_id) = shadow_external_user_id(provider, &user) {
                let inbound_key = if add {
                    dedupe::external_reaction_add(
                        &message_link.external_message_id,
                        external_user_id,
                        &reaction.emoji,
                    )
                } else {
                    dedupe::external_reaction_remove(
                        &message_link.external_message_id,
                        external_user_id,
                        &reaction.emoji,
                    )
                };
                if self
                    .receipts
                    .find_receipt(sync_connection_id, EventSource::External, &inbound_key)
                    .await?
                    .is_some()
                {
                    return Ok(Settled::ignored(IgnoreReason::ExternalOrigin, Some(link.id)));
                }
            }
        }

        let adapter = self.providers.get(provider)?;
        if add {
            adapter
                .add_reaction(
                    &link.external_channel_id,
                    &message_link.external_message_id,
                    &reaction.emoji,
                )
                .await?;
        } else {
            adapter
                .remove_reaction(
                    &link.external_channel_id,
                    &message_link.external_message_id,
                    &reaction.emoji,
                )
                .await?;
        }
        self.touch(sync_connection_id, link.id, None).await?;

        Ok(Settled::new(
            SyncOutcome::synced(reaction.message_id, message_link.external_message_id),
            Some(link.id),
        ))
    }

    pub async fn sync_thread_create(
        &self,
        sync_connection_id: Uuid,
        thread_channel_id: Uuid,
        dedupe_key: Option<String>,
    ) -> Result<SyncOutcome, SyncError> {
        let key = dedupe_key.unwrap_or_else(|| dedupe::thread_create(thread_channel_id));
        let payload = json!({ "operation": "thread.create", "channelId": thread_channel_id });

        let body = async {
            let connection = self.load_connection(sync_connection_id).await?;
            if !connection.is_active() {
                return Ok(Settled::ignored(IgnoreReason::ConnectionInactive, None));
            }
            let thread = self
                .chat
                .find_channel(thread_channel_id)
                .await?
                .ok_or_else(|| SyncError::not_found("channel", thread_channel_id))?;
            if thread.channel_type != ChannelType::Thread {
                return Err(SyncError::configuration(format!(
                    "channel {} is not a thread",
                    thread.id
                )));
            }
            if let Some(existing) = self
                .links
                .find_channel_link_by_hazel_channel(connection.id, thread.id)
                .await?
            {
                return Ok(Settled::new(SyncOutcome::AlreadyLinked, Some(existing.id)));
            }

            let link = self
                .resolve_outbound_link(&connection, thread.id)
                .await?
                .ok_or_else(|| {
                    SyncError::not_found(
                        "channel link",
                        thread.parent_channel_id.unwrap_or(thread.id),
                    )
                })?;
            self.touch(connection.id, link.id, None).await?;

            Ok(Settled::new(
                SyncOutcome::synced(thread.id, link.external_channel_id.clone()),
                Some(link.id),
            ))
        };

        self.run_claimed(
            "thread create",
            receipt_claim(sync_connection_id, EventSource::Hazel, key, &payload),
            body,
        )
        .await
    }
}
