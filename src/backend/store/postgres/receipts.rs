//! `ReceiptStore` over `chat_sync_event_receipts`.

use async_trait::async_trait;
use uuid::Uuid;

use super::{EventReceiptRow, PgStore};
use crate::backend::store::{ReceiptStore, StoreResult};
use crate::shared::models::{EventReceipt, EventSource, ReceiptClaim, ReceiptStatus};

#[async_trait]
impl ReceiptStore for PgStore {
    async fn claim(&self, claim: ReceiptClaim) -> StoreResult<bool> {
        // The unique (sync_connection_id, source, dedupe_key) constraint decides the race
        let result = sqlx::query(
            r#"
            INSERT INTO chat_sync_event_receipts
                (id, sync_connection_id, channel_link_id, source, dedupe_key,
                 status, payload_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 'claimed', $6, NOW(), NOW())
            ON CONFLICT (sync_connection_id, source, dedupe_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(claim.sync_connection_id)
        .bind(claim.channel_link_id)
        .bind(claim.source.as_str())
        .bind(&claim.dedupe_key)
        .bind(&claim.payload_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
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
        sqlx::query(
            r#"
            UPDATE chat_sync_event_receipts
            SET status = $4,
                channel_link_id = COALESCE($5, channel_link_id),
                error_message = $6,
                updated_at = NOW()
            WHERE sync_connection_id = $1 AND source = $2 AND dedupe_key = $3
            "#,
        )
        .bind(sync_connection_id)
        .bind(source.as_str())
        .bind(dedupe_key)
        .bind(status.as_str())
        .bind(channel_link_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_receipt(
        &self,
        sync_connection_id: Uuid,
        source: EventSource,
        dedupe_key: &str,
    ) -> StoreResult<Option<EventReceipt>> {
        let row = sqlx::query_as::<_, EventReceiptRow>(
            r#"
            SELECT id, sync_connection_id, channel_link_id, source, dedupe_key, status,
                   payload_hash, error_message, created_at, updated_at
            FROM chat_sync_event_receipts
            WHERE sync_connection_id = $1 AND source = $2 AND dedupe_key = $3
            "#,
        )
        .bind(sync_connection_id)
        .bind(source.as_str())
        .bind(dedupe_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EventReceipt::try_from).transpose()
    }
}
