//! Synchronization Data Model
//!
//! Rows owned by the chat synchronization subsystem (connections, links,
//! receipts, channel access) plus the narrow views of collaborator rows
//! (channels, messages, reactions, users) the subsystem reads and writes.
//!
//! Every enum that is persisted as text has `as_str` / `parse` helpers so the
//! Postgres store and the JSON surface agree on the same spelling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Status of a configured link between an organization and a platform account
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncConnectionStatus {
    Active,
    Inactive,
}

impl SyncConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(SharedError::validation(
                "status",
                format!("unknown sync connection status '{}'", other),
            )),
        }
    }
}

/// One configured link between an organization and an external platform account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncConnection {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Provider name used for adapter lookup (e.g. `discord`)
    pub provider: String,
    pub status: SyncConnectionStatus,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncConnection {
    pub fn is_active(&self) -> bool {
        self.status == SyncConnectionStatus::Active
    }
}

/// Which way content may flow across a channel link
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    HazelToExternal,
    ExternalToHazel,
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HazelToExternal => "hazel_to_external",
            Self::ExternalToHazel => "external_to_hazel",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "hazel_to_external" => Ok(Self::HazelToExternal),
            "external_to_hazel" => Ok(Self::ExternalToHazel),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(SharedError::validation(
                "direction",
                format!("unknown sync direction '{}'", other),
            )),
        }
    }

    /// Whether internal content may be mirrored to the external platform
    pub fn allows_outbound(&self) -> bool {
        matches!(self, Self::HazelToExternal | Self::Bidirectional)
    }

    /// Whether external content may be mirrored into the internal store
    pub fn allows_inbound(&self) -> bool {
        matches!(self, Self::ExternalToHazel | Self::Bidirectional)
    }
}

/// Webhook credentials used to post as the organization's configured persona
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookIdentity {
    pub webhook_id: String,
    pub webhook_token: String,
}

/// Outbound identity configuration carried in a channel link's settings blob
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundIdentity {
    /// Post through the platform bot account
    Bot,
    /// Post through a channel webhook, impersonating the internal author
    Webhook(WebhookIdentity),
}

/// Provider-specific settings stored alongside a channel link
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLinkSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_identity: Option<OutboundIdentity>,
    /// Set on links that target an external thread; holds the thread's parent channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_parent_channel_id: Option<String>,
}

impl ChannelLinkSettings {
    /// Webhook credentials when the link posts through a webhook identity
    pub fn webhook(&self) -> Option<&WebhookIdentity> {
        match &self.outbound_identity {
            Some(OutboundIdentity::Webhook(identity)) => Some(identity),
            _ => None,
        }
    }

    pub fn is_thread_link(&self) -> bool {
        self.external_parent_channel_id.is_some()
    }
}

/// Maps one internal channel to one external channel or thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLink {
    pub id: Uuid,
    pub sync_connection_id: Uuid,
    pub hazel_channel_id: Uuid,
    pub external_channel_id: String,
    pub external_channel_name: Option<String>,
    pub direction: SyncDirection,
    pub is_active: bool,
    #[serde(default)]
    pub settings: ChannelLinkSettings,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ChannelLink {
    /// Active and not soft-deleted
    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// Fields required to persist a new channel link
#[derive(Debug, Clone, PartialEq)]
pub struct NewChannelLink {
    pub sync_connection_id: Uuid,
    pub hazel_channel_id: Uuid,
    pub external_channel_id: String,
    pub external_channel_name: Option<String>,
    pub direction: SyncDirection,
    pub settings: ChannelLinkSettings,
}

/// Which side a mirrored message was first written on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    Hazel,
    External,
}

impl MessageOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hazel => "hazel",
            Self::External => "external",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "hazel" => Ok(Self::Hazel),
            "external" => Ok(Self::External),
            other => Err(SharedError::validation(
                "origin",
                format!("unknown message origin '{}'", other),
            )),
        }
    }
}

/// Maps one internal message to one external message under a channel link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageLink {
    pub id: Uuid,
    pub channel_link_id: Uuid,
    pub hazel_message_id: Uuid,
    pub external_message_id: String,
    pub origin: MessageOrigin,
    pub root_hazel_message_id: Option<Uuid>,
    pub root_external_message_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields required to persist a new message link
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessageLink {
    pub channel_link_id: Uuid,
    pub hazel_message_id: Uuid,
    pub external_message_id: String,
    pub origin: MessageOrigin,
    pub root_hazel_message_id: Option<Uuid>,
    pub root_external_message_id: Option<String>,
}

/// Which side an event receipt was raised for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Hazel,
    External,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hazel => "hazel",
            Self::External => "external",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "hazel" => Ok(Self::Hazel),
            "external" => Ok(Self::External),
            other => Err(SharedError::validation(
                "source",
                format!("unknown event source '{}'", other),
            )),
        }
    }
}

/// Lifecycle of an idempotency ledger row
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Row inserted, side effect not yet confirmed
    Claimed,
    Processed,
    Ignored,
    Failed,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claimed => "claimed",
            Self::Processed => "processed",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "claimed" => Ok(Self::Claimed),
            "processed" => Ok(Self::Processed),
            "ignored" => Ok(Self::Ignored),
            "failed" => Ok(Self::Failed),
            other => Err(SharedError::validation(
                "status",
                format!("unknown receipt status '{}'", other),
            )),
        }
    }
}

/// Idempotency ledger row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventReceipt {
    pub id: Uuid,
    pub sync_connection_id: Uuid,
    pub channel_link_id: Option<Uuid>,
    pub source: EventSource,
    pub dedupe_key: String,
    pub status: ReceiptStatus,
    pub payload_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to claim a receipt before any side effect
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptClaim {
    pub sync_connection_id: Uuid,
    pub channel_link_id: Option<Uuid>,
    pub source: EventSource,
    pub dedupe_key: String,
    pub payload_hash: Option<String>,
}

/// Derived row asserting "this user can see this channel"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccess {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub organization_id: Uuid,
    pub updated_at: DateTime<Utc>,
}

/// Channel topology kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Public,
    Private,
    Direct,
    Single,
    Thread,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Direct => "direct",
            Self::Single => "single",
            Self::Thread => "thread",
        }
    }

    pub fn parse(value: &str) -> Result<Self, SharedError> {
        match value {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "direct" => Ok(Self::Direct),
            "single" => Ok(Self::Single),
            "thread" => Ok(Self::Thread),
            other => Err(SharedError::validation(
                "type",
                format!("unknown channel type '{}'", other),
            )),
        }
    }
}

/// Internal channel as seen by the synchronization subsystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub channel_type: ChannelType,
    pub parent_channel_id: Option<Uuid>,
    /// For threads, the message in the parent channel the thread hangs off
    pub thread_root_message_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Channel {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Fields for an internal thread channel created from an external thread
#[derive(Debug, Clone, PartialEq)]
pub struct NewThreadChannel {
    pub organization_id: Uuid,
    pub parent_channel_id: Uuid,
    pub thread_root_message_id: Uuid,
    pub name: String,
}

/// Internal message as seen by the synchronization subsystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub reply_to_message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Fields for an internal message written by inbound sync
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub channel_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub reply_to_message_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    pub id: Uuid,
    pub message_id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
}

/// Reaction fields that survive the reaction row being deleted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionSnapshot {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: String,
}

/// Upsert request for a synthetic user representing an external participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowUserProfile {
    pub external_id: String,
    pub display_name: String,
    pub avatar_url: String,
    /// When false an existing avatar is left untouched on upsert
    pub sync_avatar: bool,
}
