/**
 * Persistence Interfaces
 *
 * The synchronization pipeline reaches the datastore only through the traits
 * below. Each component declares the traits it needs and receives concrete
 * implementations at construction time:
 *
 * - `LinkStore` - sync connections, channel links and message links
 * - `ReceiptStore` - the idempotency ledger
 * - `ChatStore` - channels, messages, reactions, channel members (collaborator)
 * - `DirectoryStore` - users, organization membership, identity links (collaborator)
 * - `AccessStore` - the denormalized channel visibility index
 *
 * Two implementations exist: `postgres::PgStore` (sqlx) and
 * `memory::MemoryStore`, used by tests and by database-less development runs.
 *
 * # Invariants every implementation upholds
 *
 * - `ReceiptStore::claim` is an atomic insert-or-fail on
 *   `(sync_connection_id, source, dedupe_key)`.
 * - At most one live channel link per `(connection, hazel channel)` and per
 *   `(connection, external channel)`; `insert_channel_link` returns the
 *   existing live link instead of creating a second one.
 * - At most one live message link per `(channel link, hazel message)` and per
 *   `(channel link, external message)`; `insert_message_link` follows the same
 *   converge-on-conflict rule.
 * - `replace_channel_access` / `replace_user_access` leave exactly the given
 *   set behind, atomically.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::models::{
    Channel, ChannelLink, EventReceipt, EventSource, Message, MessageLink, MessageReaction,
    NewChannelLink, NewMessage, NewMessageLink, NewThreadChannel, ReactionSnapshot, ReceiptClaim,
    ReceiptStatus, ShadowUserProfile, SyncConnection, User,
};

/// Postgres implementation
pub mod postgres;

/// In-memory implementation
pub mod memory;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Rows inserted and deleted by an access replacement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct AccessDiff {
    pub inserted: usize,
    pub deleted: usize,
}

/// Every store trait object, wired once at startup
#[derive(Clone)]
pub struct Stores {
    pub links: Arc<dyn LinkStore>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub chat: Arc<dyn ChatStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub access: Arc<dyn AccessStore>,
}

impl Stores {
    /// Use one implementation for every trait
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: LinkStore + ReceiptStore + ChatStore + DirectoryStore + AccessStore + 'static,
    {
        Self {
            links: store.clone(),
            receipts: store.clone(),
            chat: store.clone(),
            directory: store.clone(),
            access: store,
        }
    }
}

/// Connections, channel links and message links
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_connection(&self, id: Uuid) -> StoreResult<Option<SyncConnection>>;

    async fn touch_connection(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn find_channel_link(&self, id: Uuid) -> StoreResult<Option<ChannelLink>>;

    /// Live link for an internal channel under one connection
    async fn find_channel_link_by_hazel_channel(
        &self,
        sync_connection_id: Uuid,
        hazel_channel_id: Uuid,
    ) -> StoreResult<Option<ChannelLink>>;

    /// Live link for an external channel under one connection
    async fn find_channel_link_by_external_channel(
        &self,
        sync_connection_id: Uuid,
        external_channel_id: &str,
    ) -> StoreResult<Option<ChannelLink>>;

    /// Live links for an internal channel across every active connection of a provider
    async fn find_channel_links_for_hazel_channel(
        &self,
        hazel_channel_id: Uuid,
        provider: &str,
    ) -> StoreResult<Vec<ChannelLink>>;

    /// Live links of one connection
    async fn list_channel_links(&self, sync_connection_id: Uuid) -> StoreResult<Vec<ChannelLink>>;

    /// Insert, or return the live link already holding either uniqueness slot
    async fn insert_channel_link(&self, link: NewChannelLink) -> StoreResult<ChannelLink>;

    async fn touch_channel_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn find_message_link_by_hazel_message(
        &self,
        channel_link_id: Uuid,
        hazel_message_id: Uuid,
    ) -> StoreResult<Option<MessageLink>>;

    async fn find_message_link_by_external_message(
        &self,
        channel_link_id: Uuid,
        external_message_id: &str,
    ) -> StoreResult<Option<MessageLink>>;

    /// Insert, or return the live link already holding either uniqueness slot
    async fn insert_message_link(&self, link: NewMessageLink) -> StoreResult<MessageLink>;

    async fn touch_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn soft_delete_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Idempotency ledger
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Insert a `claimed` row; `false` when the key was already claimed
    async fn claim(&self, claim: ReceiptClaim) -> StoreResult<bool>;

    async fn finish(
        &self,
        sync_connection_id: Uuid,
        source: EventSource,
        dedupe_key: &str,
        status: ReceiptStatus,
        channel_link_id: Option<Uuid>,
        error_message: Option<String>,
    ) -> StoreResult<()>;

    async fn find_receipt(
        &self,
        sync_connection_id: Uuid,
        source: EventSource,
        dedupe_key: &str,
    ) -> StoreResult<Option<EventReceipt>>;
}

/// Message / reaction / channel reads and writes owned by the CRUD layer
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn find_channel(&self, id: Uuid) -> StoreResult<Option<Channel>>;

    /// Non-deleted channels of an organization
    async fn list_organization_channels(&self, organization_id: Uuid) -> StoreResult<Vec<Channel>>;

    /// Non-deleted thread channels directly under a parent
    async fn list_child_threads(&self, parent_channel_id: Uuid) -> StoreResult<Vec<Channel>>;

    async fn list_channel_member_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Channels of an organization the user is an explicit member of
    async fn list_member_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>>;

    async fn insert_thread_channel(&self, thread: NewThreadChannel) -> StoreResult<Channel>;

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>>;

    /// Non-deleted messages of a channel with no live link under `channel_link_id`, oldest first
    async fn list_unlinked_messages(
        &self,
        channel_id: Uuid,
        channel_link_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Message>>;

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message>;

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn soft_delete_message(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn find_reaction(&self, id: Uuid) -> StoreResult<Option<MessageReaction>>;

    /// Insert unless the same user already reacted with the same emoji
    async fn insert_reaction(&self, reaction: ReactionSnapshot) -> StoreResult<MessageReaction>;

    /// `true` when a row was removed
    async fn delete_reaction(&self, reaction: &ReactionSnapshot) -> StoreResult<bool>;
}

/// Users and organization membership owned by the CRUD layer
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn upsert_user_by_external_id(&self, profile: ShadowUserProfile) -> StoreResult<User>;

    /// Idempotently add an active membership
    async fn ensure_organization_member(&self, organization_id: Uuid, user_id: Uuid)
        -> StoreResult<()>;

    async fn list_active_member_ids(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn is_active_member(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool>;

    /// Real internal user an external account was linked to, if any
    async fn find_linked_user(
        &self,
        provider: &str,
        external_user_id: &str,
    ) -> StoreResult<Option<Uuid>>;
}

/// Denormalized channel visibility index
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn list_channel_user_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn list_user_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>>;

    /// Leave exactly `user_ids` as the channel's rows
    async fn replace_channel_access(
        &self,
        channel_id: Uuid,
        organization_id: Option<Uuid>,
        user_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff>;

    /// Leave exactly `channel_ids` as the user's rows within the organization
    async fn replace_user_access(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        channel_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff>;
}
