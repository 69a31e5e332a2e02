//! Backfill: mirror messages that were written before their channel was linked.

use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use super::outcome::FanOutSummary;
use super::{dedupe, ChatSyncWorker};
use crate::backend::error::SyncError;
use crate::shared::models::{ChannelLink, EventSource, Message};

impl ChatSyncWorker {
    /// Push every unmirrored message of the connection's outbound links
    ///
    /// Links are processed concurrently up to `backfill_concurrency`; messages
    /// within one link go out oldest first, at most `backfill_batch_size` per run.
    /// A message whose backfill receipt already exists (a failed attempt, or an
    /// ignored one) is parked: later runs page past it instead of retrying it.
    pub async fn backfill_connection(
        &self,
        sync_connection_id: Uuid,
    ) -> Result<FanOutSummary, SyncError> {
        let connection = self.load_connection(sync_connection_id).await?;
        if !connection.is_active() {
            tracing::debug!(
                "[ChatSync] Skipping backfill for inactive connection {}",
                connection.id
            );
            return Ok(FanOutSummary::default());
        }

        let links: Vec<ChannelLink> = self
            .links
            .list_channel_links(connection.id)
            .await?
            .into_iter()
            .filter(|link| link.is_live() && link.direction.allows_outbound())
            .collect();

        tracing::info!(
            "[ChatSync] Backfilling {} channel links on connection {}",
            links.len(),
            connection.id
        );

        let per_link: Vec<FanOutSummary> = stream::iter(links)
            .map(|link| self.backfill_link(connection.id, link))
            .buffer_unordered(self.backfill_concurrency)
            .collect()
            .await;

        let summary = per_link
            .into_iter()
            .fold(FanOutSummary::default(), |mut total, link_summary| {
                total.merge(link_summary);
                total
            });

        tracing::info!(
            "[ChatSync] Backfill of connection {} done: {} synced, {} failed, {} skipped",
            connection.id,
            summary.synced,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }

    async fn backfill_link(&self, sync_connection_id: Uuid, link: ChannelLink) -> FanOutSummary {
        let mut summary = FanOutSummary::default();

        let messages = match self.backfill_candidates(sync_connection_id, &link).await {
            Ok(messages) => messages,
            Err(err) => {
                tracing::warn!(
                    "[ChatSync] Could not list messages for channel link {}: {}",
                    link.id,
                    err
                );
                summary.failed += 1;
                return summary;
            }
        };

        for message in messages {
            let result = self
                .sync_message_create(
                    sync_connection_id,
                    message.id,
                    Some(dedupe::backfill_message(message.id)),
                )
                .await;
            match result {
                Ok(outcome) => summary.record(&outcome),
                Err(err) => {
                    tracing::warn!(
                        "[ChatSync] Backfill of message {} on link {} failed: {}",
                        message.id,
                        link.id,
                        err
                    );
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Up to `backfill_batch_size` unlinked messages with no backfill receipt yet, oldest first
    async fn backfill_candidates(
        &self,
        sync_connection_id: Uuid,
        link: &ChannelLink,
    ) -> Result<Vec<Message>, SyncError> {
        let batch_size = self.backfill_batch_size;
        let mut limit = batch_size;
        loop {
            let page = self
                .chat
                .list_unlinked_messages(link.hazel_channel_id, link.id, limit)
                .await?;
            let exhausted = page.len() < limit;

            let mut parked = 0;
            let mut fresh = Vec::with_capacity(batch_size);
            for message in page {
                let attempted = self
                    .receipts
                    .find_receipt(
                        sync_connection_id,
                        EventSource::Hazel,
                        &dedupe::backfill_message(message.id),
                    )
                    .await?
                    .is_some();
                if attempted {
                    parked += 1;
                } else {
                    fresh.push(message);
                }
            }

            if fresh.len() >= batch_size || exhausted {
                if parked > 0 {
                    tracing::debug!(
                        "[ChatSync] Backfill on link {} passed over {} parked messages",
                        link.id,
                        parked
                    );
                }
                fresh.truncate(batch_size);
                return Ok(fresh);
            }
            // Parked messages hold the head of the page; widen it past them
            limit = parked + batch_size;
        }
    }
}
