//! Results of one sync operation and of a fan-out across connections.
//!
//! Dedupe outcomes are values, not errors: callers count them separately
//! from real failures.

use serde::Serialize;
use uuid::Uuid;

/// Why an operation completed without touching the other side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Inbound message posted by our own outbound webhook
    WebhookOrigin,
    /// Update/delete/reaction for a message that was never mirrored
    NoMessageLink,
    /// Content or reaction that this connection's platform is the source of
    ExternalOrigin,
    ConnectionInactive,
    /// The channel link does not allow this direction
    Direction,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebhookOrigin => "webhook_origin",
            Self::NoMessageLink => "no_message_link",
            Self::ExternalOrigin => "external_origin",
            Self::ConnectionInactive => "connection_inactive",
            Self::Direction => "direction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The side effect happened; ids of the mirrored pair
    Synced { hazel_id: Uuid, external_id: String },
    /// The dedupe key was already claimed
    Deduped,
    /// A message link already exists for this entity
    AlreadyLinked,
    Ignored(IgnoreReason),
}

impl SyncOutcome {
    pub fn synced(hazel_id: Uuid, external_id: impl Into<String>) -> Self {
        Self::Synced {
            hazel_id,
            external_id: external_id.into(),
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }

    /// Status label for logs, metrics and HTTP responses
    pub fn label(&self) -> String {
        match self {
            Self::Synced { .. } => "synced".to_string(),
            Self::Deduped => "deduped".to_string(),
            Self::AlreadyLinked => "already_linked".to_string(),
            Self::Ignored(reason) => format!("ignored_{}", reason.as_str()),
        }
    }
}

/// JSON view of a `SyncOutcome`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeBody {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hazel_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl From<&SyncOutcome> for OutcomeBody {
    fn from(outcome: &SyncOutcome) -> Self {
        let (hazel_id, external_id) = match outcome {
            SyncOutcome::Synced {
                hazel_id,
                external_id,
            } => (Some(*hazel_id), Some(external_id.clone())),
            _ => (None, None),
        };
        Self {
            status: outcome.label(),
            hazel_id,
            external_id,
        }
    }
}

/// Per-target tally of a fan-out or backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanOutSummary {
    pub synced: usize,
    pub failed: usize,
    /// Deduped, already linked or ignored targets
    pub skipped: usize,
}

impl FanOutSummary {
    pub fn record(&mut self, outcome: &SyncOutcome) {
        if outcome.is_synced() {
            self.synced += 1;
        } else {
            self.skipped += 1;
        }
    }

    pub fn merge(&mut self, other: FanOutSummary) {
        self.synced += other.synced;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    pub fn total(&self) -> usize {
        self.synced + self.failed + self.skipped
    }
}
