/**
 * In-Memory Store
 *
 * A single `MemoryStore` implements every persistence trait over maps guarded
 * by one `RwLock`, so each trait call is atomic with respect to the others.
 * The server falls back to it when no `DATABASE_URL` is configured, and the
 * test suite uses it together with the seeding helpers at the bottom of this
 * file.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::store::{
    AccessDiff, AccessStore, ChatStore, DirectoryStore, LinkStore, ReceiptStore, StoreResult,
};
use crate::shared::models::{
    Channel, ChannelAccess, ChannelLink, ChannelType, EventReceipt, EventSource, Message,
    MessageLink, MessageReaction, NewChannelLink, NewMessage, NewMessageLink, NewThreadChannel,
    ReactionSnapshot, ReceiptClaim, ReceiptStatus, ShadowUserProfile, SyncConnection, User,
};

type ReceiptKey = (Uuid, EventSource, String);

#[derive(Debug, Default)]
struct MemoryState {
    connections: HashMap<Uuid, SyncConnection>,
    channel_links: HashMap<Uuid, ChannelLink>,
    message_links: HashMap<Uuid, MessageLink>,
    receipts: HashMap<ReceiptKey, EventReceipt>,
    channels: HashMap<Uuid, Channel>,
    /// (channel, user)
    channel_members: HashSet<(Uuid, Uuid)>,
    messages: HashMap<Uuid, Message>,
    reactions: HashMap<Uuid, MessageReaction>,
    users: HashMap<Uuid, User>,
    /// (organization, user) for active memberships
    organization_members: HashSet<(Uuid, Uuid)>,
    /// (provider, external user id) -> internal user
    identity_links: HashMap<(String, String), Uuid>,
    /// (user, channel)
    access: HashMap<(Uuid, Uuid), ChannelAccess>,
}

/// Read counters, handy for asserting which lookups a code path performed
#[derive(Debug, Default)]
pub struct MemoryStoreStats {
    message_link_reads: AtomicUsize,
    receipt_claims: AtomicUsize,
}

impl MemoryStoreStats {
    pub fn message_link_reads(&self) -> usize {
        self.message_link_reads.load(Ordering::SeqCst)
    }

    pub fn receipt_claims(&self) -> usize {
        self.receipt_claims.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    stats: MemoryStoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &MemoryStoreStats {
        &self.stats
    }
}

fn live_link_matches(link: &ChannelLink, sync_connection_id: Uuid) -> bool {
    link.sync_connection_id == sync_connection_id && link.is_live()
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn find_connection(&self, id: Uuid) -> StoreResult<Option<SyncConnection>> {
        Ok(self.state.read().await.connections.get(&id).cloned())
    }

    async fn touch_connection(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(connection) = self.state.write().await.connections.get_mut(&id) {
            connection.last_synced_at = Some(at);
        }
        Ok(())
    }

    async fn find_channel_link(&self, id: Uuid) -> StoreResult<Option<ChannelLink>> {
        Ok(self.state.read().await.channel_links.get(&id).cloned())
    }

    async fn find_channel_link_by_hazel_channel(
        &self,
        sync_connection_id: Uuid,
        hazel_channel_id: Uuid,
    ) -> StoreResult<Option<ChannelLink>> {
        let state = self.state.read().await;
        Ok(state
            .channel_links
            .values()
            .find(|link| {
                live_link_matches(link, sync_connection_id)
                    && link.hazel_channel_id == hazel_channel_id
            })
            .cloned())
    }

    async fn find_channel_link_by_external_channel(
        &self,
        sync_connection_id: Uuid,
        external_channel_id: &str,
    ) -> StoreResult<Option<ChannelLink>> {
        let state = self.state.read().await;
        Ok(state
            .channel_links
            .values()
            .find(|link| {
                live_link_matches(link, sync_connection_id)
                    && link.external_channel_id == external_channel_id
            })
            .cloned())
    }

    async fn find_channel_links_for_hazel_channel(
        &self,
        hazel_channel_id: Uuid,
        provider: &str,
    ) -> StoreResult<Vec<ChannelLink>> {
        let state = self.state.read().await;
        let mut links: Vec<ChannelLink> = state
            .channel_links
            .values()
            .filter(|link| link.is_live() && link.hazel_channel_id == hazel_channel_id)
            .filter(|link| {
                state
                    .connections
                    .get(&link.sync_connection_id)
                    .map(|connection| connection.is_active() && connection.provider == provider)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        links.sort_by_key(|link| link.id);
        Ok(links)
    }

    async fn list_channel_links(&self, sync_connection_id: Uuid) -> StoreResult<Vec<ChannelLink>> {
        let state = self.state.read().await;
        let mut links: Vec<ChannelLink> = state
            .channel_links
            .values()
            .filter(|link| live_link_matches(link, sync_connection_id))
            .cloned()
            .collect();
        links.sort_by_key(|link| link.id);
        Ok(links)
    }

    async fn insert_channel_link(&self, link: NewChannelLink) -> StoreResult<ChannelLink> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.channel_links.values().find(|existing| {
            live_link_matches(existing, link.sync_connection_id)
                && (existing.hazel_channel_id == link.hazel_channel_id
                    || existing.external_channel_id == link.external_channel_id)
        }) {
            return Ok(existing.clone());
        }

        let created = ChannelLink {
            id: Uuid::new_v4(),
            sync_connection_id: link.sync_connection_id,
            hazel_channel_id: link.hazel_channel_id,
            external_channel_id: link.external_channel_id,
            external_channel_name: link.external_channel_name,
            direction: link.direction,
            is_active: true,
            settings: link.settings,
            last_synced_at: None,
            deleted_at: None,
        };
        state.channel_links.insert(created.id, created.clone());
        Ok(created)
    }

    async fn touch_channel_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(link) = self.state.write().await.channel_links.get_mut(&id) {
            link.last_synced_at = Some(at);
        }
        Ok(())
    }

    async fn find_message_link_by_hazel_message(
        &self,
        channel_link_id: Uuid,
        hazel_message_id: Uuid,
    ) -> StoreResult<Option<MessageLink>> {
        self.stats.message_link_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Ok(state
            .message_links
            .values()
            .find(|link| {
                link.channel_link_id == channel_link_id
                    && link.hazel_message_id == hazel_message_id
                    && link.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_message_link_by_external_message(
        &self,
        channel_link_id: Uuid,
        external_message_id: &str,
    ) -> StoreResult<Option<MessageLink>> {
        self.stats.message_link_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.read().await;
        Ok(state
            .message_links
            .values()
            .find(|link| {
                link.channel_link_id == channel_link_id
                    && link.external_message_id == external_message_id
                    && link.deleted_at.is_none()
            })
            .cloned())
    }

    async fn insert_message_link(&self, link: NewMessageLink) -> StoreResult<MessageLink> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.message_links.values().find(|existing| {
            existing.channel_link_id == link.channel_link_id
                && existing.deleted_at.is_none()
                && (existing.hazel_message_id == link.hazel_message_id
                    || existing.external_message_id == link.external_message_id)
        }) {
            return Ok(existing.clone());
        }

        let created = MessageLink {
            id: Uuid::new_v4(),
            channel_link_id: link.channel_link_id,
            hazel_message_id: link.hazel_message_id,
            external_message_id: link.external_message_id,
            origin: link.origin,
            root_hazel_message_id: link.root_hazel_message_id,
            root_external_message_id: link.root_external_message_id,
            last_synced_at: Some(Utc::now()),
            deleted_at: None,
        };
        state.message_links.insert(created.id, created.clone());
        Ok(created)
    }

    async fn touch_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(link) = self.state.write().await.message_links.get_mut(&id) {
            link.last_synced_at = Some(at);
        }
        Ok(())
    }

    async fn soft_delete_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(link) = self.state.write().await.message_links.get_mut(&id) {
            link.deleted_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn claim(&self, claim: ReceiptClaim) -> StoreResult<bool> {
        self.stats.receipt_claims.fetch_add(1, Ordering::SeqCst);
        let key = (claim.sync_connection_id, claim.source, claim.dedupe_key.clone());
        let mut state = self.state.write().await;
        if state.receipts.contains_key(&key) {
            return Ok(false);
        }
        let now = Utc::now();
        state.receipts.insert(
            key,
            EventReceipt {
                id: Uuid::new_v4(),
                sync_connection_id: claim.sync_connection_id,
                channel_link_id: claim.channel_link_id,
                source: claim.source,
                dedupe_key: claim.dedupe_key,
                status: ReceiptStatus::Claimed,
                payload_hash: claim.payload_hash,
                error_message: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(true)
    }

    async fn finish(
        &self,
        sync_connection_id: Uuid,
        source: EventSource,
        dedupe_key: &str,
        status: ReceiptStatus,
        channel_link_id: Option<Uuid>,
        error_message: Option<String>,
    ) -> StoreResult<()> {
        let key = (sync_connection_id, source, dedupe_key.to_string());
        if let Some(receipt) = self.state.write().await.receipts.get_mut(&key) {
            receipt.status = status;
            if channel_link_id.is_some() {
                receipt.channel_link_id = channel_link_id;
            }
            receipt.error_message = error_message;
            receipt.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_receipt(
        &self,
        sync_connection_id: Uuid,
        source: EventSource,
        dedupe_key: &str,
    ) -> StoreResult<Option<EventReceipt>> {
        let key = (sync_connection_id, source, dedupe_key.to_string());
        Ok(self.state.read().await.receipts.get(&key).cloned())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_channel(&self, id: Uuid) -> StoreResult<Option<Channel>> {
        Ok(self.state.read().await.channels.get(&id).cloned())
    }

    async fn list_organization_channels(&self, organization_id: Uuid) -> StoreResult<Vec<Channel>> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .values()
            .filter(|channel| channel.organization_id == organization_id && !channel.is_deleted())
            .cloned()
            .collect())
    }

    async fn list_child_threads(&self, parent_channel_id: Uuid) -> StoreResult<Vec<Channel>> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .values()
            .filter(|channel| {
                channel.channel_type == ChannelType::Thread
                    && channel.parent_channel_id == Some(parent_channel_id)
                    && !channel.is_deleted()
            })
            .cloned()
            .collect())
    }

    async fn list_channel_member_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .channel_members
            .iter()
            .filter(|(channel, _)| *channel == channel_id)
            .map(|(_, user)| *user)
            .collect())
    }

    async fn list_member_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .channel_members
            .iter()
            .filter(|(_, user)| *user == user_id)
            .filter(|(channel, _)| {
                state
                    .channels
                    .get(channel)
                    .map(|c| c.organization_id == organization_id && !c.is_deleted())
                    .unwrap_or(false)
            })
            .map(|(channel, _)| *channel)
            .collect())
    }

    async fn insert_thread_channel(&self, thread: NewThreadChannel) -> StoreResult<Channel> {
        let channel = Channel {
            id: Uuid::new_v4(),
            organization_id: thread.organization_id,
            name: thread.name,
            channel_type: ChannelType::Thread,
            parent_channel_id: Some(thread.parent_channel_id),
            thread_root_message_id: Some(thread.thread_root_message_id),
            deleted_at: None,
        };
        self.state
            .write()
            .await
            .channels
            .insert(channel.id, channel.clone());
        Ok(channel)
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(self.state.read().await.messages.get(&id).cloned())
    }

    async fn list_unlinked_messages(
        &self,
        channel_id: Uuid,
        channel_link_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        let state = self.state.read().await;
        let linked: HashSet<Uuid> = state
            .message_links
            .values()
            .filter(|link| link.channel_link_id == channel_link_id && link.deleted_at.is_none())
            .map(|link| link.hazel_message_id)
            .collect();
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|message| {
                message.channel_id == channel_id
                    && message.deleted_at.is_none()
                    && !linked.contains(&message.id)
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        messages.truncate(limit);
        Ok(messages)
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        let now = Utc::now();
        let created = Message {
            id: Uuid::new_v4(),
            channel_id: message.channel_id,
            author_id: message.author_id,
            content: message.content,
            reply_to_message_id: message.reply_to_message_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.state
            .write()
            .await
            .messages
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(message) = self.state.write().await.messages.get_mut(&id) {
            message.content = content.to_string();
            message.updated_at = at;
        }
        Ok(())
    }

    async fn soft_delete_message(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(message) = self.state.write().await.messages.get_mut(&id) {
            message.deleted_at = Some(at);
        }
        Ok(())
    }

    async fn find_reaction(&self, id: Uuid) -> StoreResult<Option<MessageReaction>> {
        Ok(self.state.read().await.reactions.get(&id).cloned())
    }

    async fn insert_reaction(&self, reaction: ReactionSnapshot) -> StoreResult<MessageReaction> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.reactions.values().find(|existing| {
            existing.message_id == reaction.message_id
                && existing.user_id == reaction.user_id
                && existing.emoji == reaction.emoji
        }) {
            return Ok(existing.clone());
        }
        let channel_id = state
            .messages
            .get(&reaction.message_id)
            .map(|message| message.channel_id)
            .unwrap_or_default();
        let created = MessageReaction {
            id: Uuid::new_v4(),
            message_id: reaction.message_id,
            channel_id,
            user_id: reaction.user_id,
            emoji: reaction.emoji,
        };
        state.reactions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_reaction(&self, reaction: &ReactionSnapshot) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let before = state.reactions.len();
        state.reactions.retain(|_, existing| {
            !(existing.message_id == reaction.message_id
                && existing.user_id == reaction.user_id
                && existing.emoji == reaction.emoji)
        });
        Ok(state.reactions.len() < before)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn upsert_user_by_external_id(&self, profile: ShadowUserProfile) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .users
            .values_mut()
            .find(|user| user.external_id == profile.external_id)
        {
            existing.display_name = profile.display_name;
            if profile.sync_avatar {
                existing.avatar_url = profile.avatar_url;
            }
            return Ok(existing.clone());
        }
        let user = User {
            id: Uuid::new_v4(),
            external_id: profile.external_id,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ensure_organization_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<()> {
        self.state
            .write()
            .await
            .organization_members
            .insert((organization_id, user_id));
        Ok(())
    }

    async fn list_active_member_ids(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .organization_members
            .iter()
            .filter(|(org, _)| *org == organization_id)
            .map(|(_, user)| *user)
            .collect())
    }

    async fn is_active_member(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .await
            .organization_members
            .contains(&(organization_id, user_id)))
    }

    async fn find_linked_user(
        &self,
        provider: &str,
        external_user_id: &str,
    ) -> StoreResult<Option<Uuid>> {
        Ok(self
            .state
            .read()
            .await
            .identity_links
            .get(&(provider.to_string(), external_user_id.to_string()))
            .copied())
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn list_channel_user_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .access
            .keys()
            .filter(|(_, channel)| *channel == channel_id)
            .map(|(user, _)| *user)
            .collect())
    }

    async fn list_user_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .access
            .values()
            .filter(|row| row.user_id == user_id && row.organization_id == organization_id)
            .map(|row| row.channel_id)
            .collect())
    }

    async fn replace_channel_access(
        &self,
        channel_id: Uuid,
        organization_id: Option<Uuid>,
        user_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff> {
        let mut state = self.state.write().await;
        let mut diff = AccessDiff::default();
        let before = state.access.len();
        state
            .access
            .retain(|(user, channel), _| *channel != channel_id || user_ids.contains(user));
        diff.deleted = before - state.access.len();

        if let Some(organization_id) = organization_id {
            let now = Utc::now();
            for user_id in user_ids {
                let row = state
                    .access
                    .entry((*user_id, channel_id))
                    .or_insert_with(|| {
                        diff.inserted += 1;
                        ChannelAccess {
                            user_id: *user_id,
                            channel_id,
                            organization_id,
                            updated_at: now,
                        }
                    });
                row.organization_id = organization_id;
                row.updated_at = now;
            }
        }
        Ok(diff)
    }

    async fn replace_user_access(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        channel_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff> {
        let mut state = self.state.write().await;
        let mut diff = AccessDiff::default();
        let before = state.access.len();
        state.access.retain(|(user, channel), row| {
            *user != user_id
                || row.organization_id != organization_id
                || channel_ids.contains(channel)
        });
        diff.deleted = before - state.access.len();

        let now = Utc::now();
        for channel_id in channel_ids {
            let row = state
                .access
                .entry((user_id, *channel_id))
                .or_insert_with(|| {
                    diff.inserted += 1;
                    ChannelAccess {
                        user_id,
                        channel_id: *channel_id,
                        organization_id,
                        updated_at: now,
                    }
                });
            row.updated_at = now;
        }
        Ok(diff)
    }
}

// Seeding and inspection helpers. The CRUD layer owns these rows in
// production; here they let tests and local runs stand up a world.
impl MemoryStore {
    pub async fn put_connection(&self, connection: SyncConnection) {
        self.state
            .write()
            .await
            .connections
            .insert(connection.id, connection);
    }

    pub async fn put_channel_link(&self, link: ChannelLink) {
        self.state.write().await.channel_links.insert(link.id, link);
    }

    pub async fn put_message_link(&self, link: MessageLink) {
        self.state.write().await.message_links.insert(link.id, link);
    }

    pub async fn put_channel(&self, channel: Channel) {
        self.state.write().await.channels.insert(channel.id, channel);
    }

    pub async fn delete_channel(&self, channel_id: Uuid, at: DateTime<Utc>) {
        if let Some(channel) = self.state.write().await.channels.get_mut(&channel_id) {
            channel.deleted_at = Some(at);
        }
    }

    pub async fn put_channel_member(&self, channel_id: Uuid, user_id: Uuid) {
        self.state
            .write()
            .await
            .channel_members
            .insert((channel_id, user_id));
    }

    pub async fn put_message(&self, message: Message) {
        self.state.write().await.messages.insert(message.id, message);
    }

    pub async fn put_reaction(&self, reaction: MessageReaction) {
        self.state
            .write()
            .await
            .reactions
            .insert(reaction.id, reaction);
    }

    pub async fn put_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn put_organization_member(&self, organization_id: Uuid, user_id: Uuid) {
        self.state
            .write()
            .await
            .organization_members
            .insert((organization_id, user_id));
    }

    pub async fn remove_organization_member(&self, organization_id: Uuid, user_id: Uuid) {
        self.state
            .write()
            .await
            .organization_members
            .remove(&(organization_id, user_id));
    }

    pub async fn put_identity_link(&self, provider: &str, external_user_id: &str, user_id: Uuid) {
        self.state.write().await.identity_links.insert(
            (provider.to_string(), external_user_id.to_string()),
            user_id,
        );
    }

    pub async fn message_links(&self) -> Vec<MessageLink> {
        self.state.read().await.message_links.values().cloned().collect()
    }

    pub async fn channel_links(&self) -> Vec<ChannelLink> {
        self.state.read().await.channel_links.values().cloned().collect()
    }

    pub async fn receipts(&self) -> Vec<EventReceipt> {
        self.state.read().await.receipts.values().cloned().collect()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.values().cloned().collect()
    }

    pub async fn reactions(&self) -> Vec<MessageReaction> {
        self.state.read().await.reactions.values().cloned().collect()
    }

    pub async fn users(&self) -> Vec<User> {
        self.state.read().await.users.values().cloned().collect()
    }

    pub async fn channels(&self) -> Vec<Channel> {
        self.state.read().await.channels.values().cloned().collect()
    }

    pub async fn access_rows(&self) -> Vec<ChannelAccess> {
        self.state.read().await.access.values().cloned().collect()
    }
}
