/**
 * Chat Sync Worker
 *
 * Orchestrates one logical sync operation at a time:
 *
 * 1. Claim the receipt for `(connection, source, dedupe key)`; a lost claim
 *    returns `Deduped` before any other work
 * 2. Load the connection (inactive connections are a no-op)
 * 3. Resolve the channel link and message link
 * 4. Call the provider adapter, or write the internal row for inbound events
 * 5. Persist the mapping and mark the receipt `processed` / `ignored`
 *
 * A failure after the claim marks the receipt `failed` and propagates. The row
 * stays claimed, so replaying the same key is still `Deduped`.
 *
 * # Module Structure
 *
 * ```text
 * chat_sync/
 * ├── mod.rs            - ChatSyncWorker, receipt claim/finish helper
 * ├── outcome.rs        - SyncOutcome, IgnoreReason, FanOutSummary
 * ├── dedupe.rs         - Dedupe key builders, payload hash
 * ├── channel_links.rs  - Outbound link resolution, lazy thread links
 * ├── identity.rs       - Shadow users for external authors
 * ├── outbound.rs       - Internal -> external operations
 * ├── fanout.rs         - `..._to_all_connections` variants
 * ├── inbound.rs        - External -> internal operations
 * ├── backfill.rs       - Mirror messages that predate the link
 * └── handlers.rs       - HTTP entry points
 * ```
 */

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::backend::channel_access::ChannelAccessEngine;
use crate::backend::error::SyncError;
use crate::backend::provider::ProviderRegistry;
use crate::backend::store::{ChatStore, DirectoryStore, LinkStore, ReceiptStore, Stores};
use crate::shared::config::SyncConfig;
use crate::shared::models::{EventSource, ReceiptClaim, ReceiptStatus, SyncConnection};

pub mod backfill;
pub mod channel_links;
pub mod dedupe;
pub mod fanout;
pub mod handlers;
pub mod identity;
pub mod inbound;
pub mod outbound;
pub mod outcome;

pub use inbound::{
    ExternalAuthor, InboundMessage, InboundMessageDelete, InboundMessageUpdate, InboundReaction,
    InboundThread,
};
pub use outcome::{FanOutSummary, IgnoreReason, OutcomeBody, SyncOutcome};

/// What an operation body settled on, plus the link to record on the receipt
#[derive(Debug)]
pub(crate) struct Settled {
    outcome: SyncOutcome,
    channel_link_id: Option<Uuid>,
}

impl Settled {
    pub(crate) fn new(outcome: SyncOutcome, channel_link_id: Option<Uuid>) -> Self {
        Self {
            outcome,
            channel_link_id,
        }
    }

    pub(crate) fn ignored(reason: IgnoreReason, channel_link_id: Option<Uuid>) -> Self {
        Self::new(SyncOutcome::Ignored(reason), channel_link_id)
    }
}

pub struct ChatSyncWorker {
    links: Arc<dyn LinkStore>,
    receipts: Arc<dyn ReceiptStore>,
    chat: Arc<dyn ChatStore>,
    directory: Arc<dyn DirectoryStore>,
    providers: ProviderRegistry,
    access: Arc<ChannelAccessEngine>,
    fanout_concurrency: usize,
    backfill_concurrency: usize,
    backfill_batch_size: usize,
}

impl ChatSyncWorker {
    pub fn new(
        stores: &Stores,
        providers: ProviderRegistry,
        access: Arc<ChannelAccessEngine>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            links: stores.links.clone(),
            receipts: stores.receipts.clone(),
            chat: stores.chat.clone(),
            directory: stores.directory.clone(),
            providers,
            access,
            fanout_concurrency: config.fanout_concurrency.max(1),
            backfill_concurrency: config.backfill_concurrency.max(1),
            backfill_batch_size: config.backfill_batch_size.max(1),
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Claim the receipt, run `body`, then record how it ended
    ///
    /// `body` is a lazy future: nothing in it runs unless the claim succeeds.
    pub(crate) async fn run_claimed<Fut>(
        &self,
        operation: &str,
        claim: ReceiptClaim,
        body: Fut,
    ) -> Result<SyncOutcome, SyncError>
    where
        Fut: Future<Output = Result<Settled, SyncError>>,
    {
        let connection_id = claim.sync_connection_id;
        let source = claim.source;
        let dedupe_key = claim.dedupe_key.clone();

        if !self.receipts.claim(claim).await? {
            tracing::debug!("[ChatSync] {} deduped: {}", operation, dedupe_key);
            return Ok(SyncOutcome::Deduped);
        }

        match body.await {
            Ok(settled) => {
                let status = if settled.outcome.is_synced() {
                    ReceiptStatus::Processed
                } else {
                    ReceiptStatus::Ignored
                };
                self.receipts
                    .finish(
                        connection_id,
                        source,
                        &dedupe_key,
                        status,
                        settled.channel_link_id,
                        None,
                    )
                    .await?;

                if settled.outcome.is_synced() {
                    tracing::info!(
                        "[ChatSync] {} synced on connection {} ({})",
                        operation,
                        connection_id,
                        dedupe_key
                    );
                } else {
                    tracing::debug!(
                        "[ChatSync] {} {} ({})",
                        operation,
                        settled.outcome.label(),
                        dedupe_key
                    );
                }
                Ok(settled.outcome)
            }
            Err(err) => {
                tracing::warn!(
                    "[ChatSync] {} failed on connection {} ({}): {}",
                    operation,
                    connection_id,
                    dedupe_key,
                    err
                );
                if let Err(finish_err) = self
                    .receipts
                    .finish(
                        connection_id,
                        source,
                        &dedupe_key,
                        ReceiptStatus::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await
                {
                    tracing::error!(
                        "[ChatSync] Could not mark receipt {} failed: {}",
                        dedupe_key,
                        finish_err
                    );
                }
                Err(err)
            }
        }
    }

    pub(crate) async fn load_connection(
        &self,
        sync_connection_id: Uuid,
    ) -> Result<SyncConnection, SyncError> {
        self.links
            .find_connection(sync_connection_id)
            .await?
            .ok_or_else(|| SyncError::not_found("sync connection", sync_connection_id))
    }

    /// Stamp `last_synced_at` on the connection, the channel link and optionally the message link
    pub(crate) async fn touch(
        &self,
        sync_connection_id: Uuid,
        channel_link_id: Uuid,
        message_link_id: Option<Uuid>,
    ) -> Result<(), SyncError> {
        let now = Utc::now();
        self.links.touch_connection(sync_connection_id, now).await?;
        self.links.touch_channel_link(channel_link_id, now).await?;
        if let Some(message_link_id) = message_link_id {
            self.links.touch_message_link(message_link_id, now).await?;
        }
        Ok(())
    }
}

pub(crate) fn receipt_claim(
    sync_connection_id: Uuid,
    source: EventSource,
    dedupe_key: String,
    payload: &serde_json::Value,
) -> ReceiptClaim {
    ReceiptClaim {
        sync_connection_id,
        channel_link_id: None,
        source,
        dedupe_key,
        payload_hash: dedupe::payload_hash(payload),
    }
}
