//! Sequential batch processing in commit order.

use async_trait::async_trait;
use serde::Serialize;

use super::ordering::sort_by_commit_order;
use crate::backend::error::SyncError;
use crate::shared::change_event::ChangeEvent;

/// Per-event work applied by the sequencer
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn handle(&self, event: &ChangeEvent) -> Result<(), SyncError>;
}

/// Completion marker for a batch; per-event results live in logs and receipts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Events handed to the handler
    pub total: usize,
}

/// Sort `events` into commit order and run `handler` on each, one at a time
///
/// A failing event is logged and skipped; later events still run.
pub async fn process_in_commit_order<H>(mut events: Vec<ChangeEvent>, handler: &H) -> BatchOutcome
where
    H: ChangeHandler + ?Sized,
{
    sort_by_commit_order(&mut events);

    for event in &events {
        if let Err(err) = handler.handle(event).await {
            tracing::warn!(
                "[Sequencer] {} {} on {} failed ({}): {}",
                event.action.as_str(),
                event.record_id(),
                event.table(),
                err.kind(),
                err
            );
        }
    }

    tracing::debug!("[Sequencer] Processed batch of {} events", events.len());
    BatchOutcome {
        total: events.len(),
    }
}
