/**
 * Postgres Store
 *
 * `PgStore` implements every persistence trait with sqlx over a shared
 * `PgPool`. Queries are plain runtime queries (`sqlx::query` /
 * `sqlx::query_as`) so the crate builds without a live database.
 *
 * Uniqueness rules live in the schema (see `migrations/`). Inserts that may
 * race use `ON CONFLICT DO NOTHING` and fall back to re-reading the row that
 * won, which is how concurrent first-sync attempts converge to one link.
 */

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::backend::error::StoreError;
use crate::shared::models::{
    Channel, ChannelLink, ChannelLinkSettings, ChannelType, EventReceipt, EventSource, Message,
    MessageLink, MessageOrigin, ReceiptStatus, SyncConnection, SyncConnectionStatus,
    SyncDirection,
};

mod access;
mod chat;
mod directory;
mod links;
mod receipts;

/// sqlx-backed implementation of the store traits
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SyncConnectionRow {
    id: Uuid,
    organization_id: Uuid,
    provider: String,
    status: String,
    last_synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<SyncConnectionRow> for SyncConnection {
    type Error = StoreError;

    fn try_from(row: SyncConnectionRow) -> Result<Self, Self::Error> {
        Ok(SyncConnection {
            id: row.id,
            organization_id: row.organization_id,
            provider: row.provider,
            status: SyncConnectionStatus::parse(&row.status)?,
            last_synced_at: row.last_synced_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChannelLinkRow {
    id: Uuid,
    sync_connection_id: Uuid,
    hazel_channel_id: Uuid,
    external_channel_id: String,
    external_channel_name: Option<String>,
    direction: String,
    is_active: bool,
    settings: Json<ChannelLinkSettings>,
    last_synced_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ChannelLinkRow> for ChannelLink {
    type Error = StoreError;

    fn try_from(row: ChannelLinkRow) -> Result<Self, Self::Error> {
        Ok(ChannelLink {
            id: row.id,
            sync_connection_id: row.sync_connection_id,
            hazel_channel_id: row.hazel_channel_id,
            external_channel_id: row.external_channel_id,
            external_channel_name: row.external_channel_name,
            direction: SyncDirection::parse(&row.direction)?,
            is_active: row.is_active,
            settings: row.settings.0,
            last_synced_at: row.last_synced_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageLinkRow {
    id: Uuid,
    channel_link_id: Uuid,
    hazel_message_id: Uuid,
    external_message_id: String,
    origin: String,
    root_hazel_message_id: Option<Uuid>,
    root_external_message_id: Option<String>,
    last_synced_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<MessageLinkRow> for MessageLink {
    type Error = StoreError;

    fn try_from(row: MessageLinkRow) -> Result<Self, Self::Error> {
        Ok(MessageLink {
            id: row.id,
            channel_link_id: row.channel_link_id,
            hazel_message_id: row.hazel_message_id,
            external_message_id: row.external_message_id,
            origin: MessageOrigin::parse(&row.origin)?,
            root_hazel_message_id: row.root_hazel_message_id,
            root_external_message_id: row.root_external_message_id,
            last_synced_at: row.last_synced_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventReceiptRow {
    id: Uuid,
    sync_connection_id: Uuid,
    channel_link_id: Option<Uuid>,
    source: String,
    dedupe_key: String,
    status: String,
    payload_hash: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventReceiptRow> for EventReceipt {
    type Error = StoreError;

    fn try_from(row: EventReceiptRow) -> Result<Self, Self::Error> {
        Ok(EventReceipt {
            id: row.id,
            sync_connection_id: row.sync_connection_id,
            channel_link_id: row.channel_link_id,
            source: EventSource::parse(&row.source)?,
            dedupe_key: row.dedupe_key,
            status: ReceiptStatus::parse(&row.status)?,
            payload_hash: row.payload_hash,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChannelRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    channel_type: String,
    parent_channel_id: Option<Uuid>,
    thread_root_message_id: Option<Uuid>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = StoreError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            channel_type: ChannelType::parse(&row.channel_type)?,
            parent_channel_id: row.parent_channel_id,
            thread_root_message_id: row.thread_root_message_id,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: Uuid,
    channel_id: Uuid,
    author_id: Uuid,
    content: String,
    reply_to_message_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            channel_id: row.channel_id,
            author_id: row.author_id,
            content: row.content,
            reply_to_message_id: row.reply_to_message_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Convert a batch of rows, failing on the first unparseable one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
