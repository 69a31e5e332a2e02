//! Outbound channel link resolution.
//!
//! A direct link wins. A thread channel without one gets a link created on
//! first use: the parent's link is located, the thread's root message is
//! resolved to its external twin, the provider creates the external thread
//! and the new link is persisted. Concurrent first uses converge on the same
//! link through the store's uniqueness rule.

use uuid::Uuid;

use super::ChatSyncWorker;
use crate::backend::error::SyncError;
use crate::backend::provider::WebhookDelivery;
use crate::shared::models::{
    ChannelLink, ChannelLinkSettings, ChannelType, Message, NewChannelLink, SyncConnection,
};

impl ChatSyncWorker {
    /// Live outbound link for an internal channel, creating a thread link when possible
    pub(crate) async fn resolve_outbound_link(
        &self,
        connection: &SyncConnection,
        hazel_channel_id: Uuid,
    ) -> Result<Option<ChannelLink>, SyncError> {
        if let Some(link) = self
            .links
            .find_channel_link_by_hazel_channel(connection.id, hazel_channel_id)
            .await?
        {
            return Ok(Some(link));
        }
        self.provision_thread_link(connection, hazel_channel_id).await
    }

    async fn provision_thread_link(
        &self,
        connection: &SyncConnection,
        thread_channel_id: Uuid,
    ) -> Result<Option<ChannelLink>, SyncError> {
        let Some(thread) = self.chat.find_channel(thread_channel_id).await? else {
            return Ok(None);
        };
        if thread.channel_type != ChannelType::Thread || thread.is_deleted() {
            return Ok(None);
        }
        let (Some(parent_id), Some(root_message_id)) =
            (thread.parent_channel_id, thread.thread_root_message_id)
        else {
            return Ok(None);
        };

        let Some(parent_link) = self
            .links
            .find_channel_link_by_hazel_channel(connection.id, parent_id)
            .await?
        else {
            return Ok(None);
        };
        if parent_link.settings.is_thread_link() || !parent_link.direction.allows_outbound() {
            return Ok(None);
        }

        let Some(root_link) = self
            .links
            .find_message_link_by_hazel_message(parent_link.id, root_message_id)
            .await?
        else {
            tracing::debug!(
                "[ChatSync] Thread {} root message {} is not mirrored; no thread link",
                thread.id,
                root_message_id
            );
            return Ok(None);
        };

        let adapter = self.providers.get(&connection.provider)?;
        let external_thread_id = adapter
            .create_thread(
                &parent_link.external_channel_id,
                &root_link.external_message_id,
                &thread.name,
            )
            .await?;

        let link = self
            .links
            .insert_channel_link(NewChannelLink {
                sync_connection_id: connection.id,
                hazel_channel_id: thread.id,
                external_channel_id: external_thread_id,
                external_channel_name: Some(thread.name.clone()),
                direction: parent_link.direction,
                settings: ChannelLinkSettings {
                    outbound_identity: parent_link.settings.outbound_identity.clone(),
                    external_parent_channel_id: Some(parent_link.external_channel_id.clone()),
                },
            })
            .await?;

        tracing::info!(
            "[ChatSync] Linked thread {} to external thread {} on connection {}",
            thread.id,
            link.external_channel_id,
            connection.id
        );

        self.access.sync_channel(thread.id).await?;
        Ok(Some(link))
    }

    /// Root message pair for messages mirrored into a thread link
    pub(crate) async fn thread_roots(
        &self,
        link: &ChannelLink,
    ) -> Result<(Option<Uuid>, Option<String>), SyncError> {
        if !link.settings.is_thread_link() {
            return Ok((None, None));
        }
        let root = self
            .chat
            .find_channel(link.hazel_channel_id)
            .await?
            .and_then(|channel| channel.thread_root_message_id);
        // Discord threads started from a message share that message's id
        Ok((root, Some(link.external_channel_id.clone())))
    }

    /// Webhook posting details when the link uses a webhook identity
    pub(crate) async fn webhook_delivery(
        &self,
        link: &ChannelLink,
        author_id: Option<Uuid>,
    ) -> Result<Option<WebhookDelivery>, SyncError> {
        let Some(identity) = link.settings.webhook() else {
            return Ok(None);
        };
        let author = match author_id {
            Some(author_id) => self.directory.find_user(author_id).await?,
            None => None,
        };
        Ok(Some(WebhookDelivery {
            identity: identity.clone(),
            username: author.as_ref().map(|user| user.display_name.clone()),
            avatar_url: author
                .map(|user| user.avatar_url)
                .filter(|url| !url.is_empty()),
            thread_id: link
                .settings
                .is_thread_link()
                .then(|| link.external_channel_id.clone()),
        }))
    }

    /// External id of the message `message` replies to, if that one is mirrored
    pub(crate) async fn resolve_reply_target(
        &self,
        link: &ChannelLink,
        message: &Message,
    ) -> Result<Option<String>, SyncError> {
        let Some(reply_to) = message.reply_to_message_id else {
            return Ok(None);
        };
        let target = self
            .links
            .find_message_link_by_hazel_message(link.id, reply_to)
            .await?;
        if target.is_none() {
            tracing::debug!(
                "[ChatSync] Reply target {} not mirrored; sending {} as a plain message",
                reply_to,
                message.id
            );
        }
        Ok(target.map(|link| link.external_message_id))
    }
}

/// Channel to post into: a webhook on a thread link posts into the parent channel
pub(crate) fn delivery_channel_id(link: &ChannelLink, webhook: Option<&WebhookDelivery>) -> String {
    match (webhook, &link.settings.external_parent_channel_id) {
        (Some(_), Some(parent)) => parent.clone(),
        _ => link.external_channel_id.clone(),
    }
}
