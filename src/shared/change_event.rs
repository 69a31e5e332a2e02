//! Change-Capture Payload Types
//!
//! Records delivered by the replication stream webhook. A batch looks like
//! `{ "data": [ { "record": .., "metadata": .., "action": .., "changes": .. } ] }`.
//! Only `record.id`, `action` and the three commit fields take part in
//! ordering; the rest is carried through for the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Row-level operation captured from the primary datastore
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Commit metadata attached to every captured record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeMetadata {
    pub table_name: String,
    pub commit_timestamp: DateTime<Utc>,
    pub commit_lsn: i64,
    #[serde(default)]
    pub commit_idx: i64,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// One captured row change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub record: Value,
    pub metadata: ChangeMetadata,
    pub action: ChangeAction,
    #[serde(default)]
    pub changes: Option<Value>,
}

impl ChangeEvent {
    /// Stable record id used as the final ordering tiebreak.
    ///
    /// String ids are used verbatim, numeric ids are rendered in decimal and a
    /// missing id sorts first as the empty string.
    pub fn record_id(&self) -> String {
        match self.record.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.metadata.table_name
    }

    /// Read a UUID column from the record payload
    pub fn uuid_field(&self, field: &str) -> Option<Uuid> {
        self.record
            .get(field)
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Read a text column from the record payload
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.record.get(field).and_then(Value::as_str)
    }

    /// True when the column is present and not null
    pub fn has_value(&self, field: &str) -> bool {
        matches!(self.record.get(field), Some(value) if !value.is_null())
    }

    /// Causally stable key for sync calls made on behalf of this event
    pub fn dedupe_key(&self) -> String {
        match &self.metadata.idempotency_key {
            Some(key) if !key.is_empty() => format!("hazel:cdc:{}", key),
            _ => format!(
                "hazel:cdc:{}:{}:{}:{}:{}",
                self.metadata.table_name,
                self.action.as_str(),
                self.record_id(),
                self.metadata.commit_lsn,
                self.metadata.commit_idx,
            ),
        }
    }
}

/// Webhook body carrying a batch of change events
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeBatch {
    #[serde(default)]
    pub data: Vec<ChangeEvent>,
}
