//! Deterministic dedupe keys and payload hashing for the receipt ledger.
//!
//! A key identifies one logical operation. Outbound keys start with `hazel:`,
//! inbound keys with `external:`. Change-capture replays pass their own
//! `hazel:cdc:` key instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn message_create(message_id: Uuid) -> String {
    format!("hazel:message:create:{}", message_id)
}

pub fn message_update(message_id: Uuid, updated_at: DateTime<Utc>) -> String {
    format!(
        "hazel:message:update:{}:{}",
        message_id,
        updated_at.timestamp_millis()
    )
}

pub fn message_delete(message_id: Uuid) -> String {
    format!("hazel:message:delete:{}", message_id)
}

pub fn reaction_create(reaction_id: Uuid) -> String {
    format!("hazel:reaction:create:{}", reaction_id)
}

pub fn reaction_delete(message_id: Uuid, user_id: Uuid, emoji: &str) -> String {
    format!("hazel:reaction:delete:{}:{}:{}", message_id, user_id, emoji)
}

pub fn thread_create(thread_channel_id: Uuid) -> String {
    format!("hazel:thread:create:{}", thread_channel_id)
}

pub fn backfill_message(message_id: Uuid) -> String {
    format!("hazel:backfill:message:{}", message_id)
}

pub fn external_message_create(external_message_id: &str) -> String {
    format!("external:message:create:{}", external_message_id)
}

/// `revision` is the edit timestamp in millis, or a payload hash prefix when the
/// platform did not supply one
pub fn external_message_update(external_message_id: &str, revision: &str) -> String {
    format!("external:message:update:{}:{}", external_message_id, revision)
}

pub fn external_message_delete(external_message_id: &str) -> String {
    format!("external:message:delete:{}", external_message_id)
}

pub fn external_reaction_add(external_message_id: &str, external_user_id: &str, emoji: &str) -> String {
    format!(
        "external:reaction:add:{}:{}:{}",
        external_message_id, external_user_id, emoji
    )
}

pub fn external_reaction_remove(
    external_message_id: &str,
    external_user_id: &str,
    emoji: &str,
) -> String {
    format!(
        "external:reaction:remove:{}:{}:{}",
        external_message_id, external_user_id, emoji
    )
}

pub fn external_thread_create(external_thread_id: &str) -> String {
    format!("external:thread:create:{}", external_thread_id)
}

/// SHA-256 hex digest of the JSON form of `payload`
pub fn payload_hash<T: Serialize + ?Sized>(payload: &T) -> Option<String> {
    let bytes = serde_json::to_vec(payload).ok()?;
    Some(hex::encode(Sha256::digest(&bytes)))
}
