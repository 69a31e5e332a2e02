//! `LinkStore` over `sync_connections`, `chat_sync_channel_links` and
//! `chat_sync_message_links`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::{convert_all, ChannelLinkRow, MessageLinkRow, PgStore, SyncConnectionRow};
use crate::backend::store::{LinkStore, StoreResult};
use crate::shared::models::{
    ChannelLink, MessageLink, NewChannelLink, NewMessageLink, SyncConnection,
};

#[async_trait]
impl LinkStore for PgStore {
    async fn find_connection(&self, id: Uuid) -> StoreResult<Option<SyncConnection>> {
        let row = sqlx::query_as::<_, SyncConnectionRow>(
            r#"
            SELECT id, organization_id, provider, status, last_synced_at
            FROM sync_connections
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncConnection::try_from).transpose()
    }

    async fn touch_connection(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_connections SET last_synced_at = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_channel_link(&self, id: Uuid) -> StoreResult<Option<ChannelLink>> {
        let row = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT id, sync_connection_id, hazel_channel_id, external_channel_id,
                   external_channel_name, direction, is_active, settings,
                   last_synced_at, deleted_at
            FROM chat_sync_channel_links
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChannelLink::try_from).transpose()
    }

    async fn find_channel_link_by_hazel_channel(
        &self,
        sync_connection_id: Uuid,
        hazel_channel_id: Uuid,
    ) -> StoreResult<Option<ChannelLink>> {
        let row = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT id, sync_connection_id, hazel_channel_id, external_channel_id,
                   external_channel_name, direction, is_active, settings,
                   last_synced_at, deleted_at
            FROM chat_sync_channel_links
            WHERE sync_connection_id = $1
              AND hazel_channel_id = $2
              AND is_active
              AND deleted_at IS NULL
            "#,
        )
        .bind(sync_connection_id)
        .bind(hazel_channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChannelLink::try_from).transpose()
    }

    async fn find_channel_link_by_external_channel(
        &self,
        sync_connection_id: Uuid,
        external_channel_id: &str,
    ) -> StoreResult<Option<ChannelLink>> {
        let row = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT id, sync_connection_id, hazel_channel_id, external_channel_id,
                   external_channel_name, direction, is_active, settings,
                   last_synced_at, deleted_at
            FROM chat_sync_channel_links
            WHERE sync_connection_id = $1
              AND external_channel_id = $2
              AND is_active
              AND deleted_at IS NULL
            "#,
        )
        .bind(sync_connection_id)
        .bind(external_channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChannelLink::try_from).transpose()
    }

    async fn find_channel_links_for_hazel_channel(
        &self,
        hazel_channel_id: Uuid,
        provider: &str,
    ) -> StoreResult<Vec<ChannelLink>> {
        let rows = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT l.id, l.sync_connection_id, l.hazel_channel_id, l.external_channel_id,
                   l.external_channel_name, l.direction, l.is_active, l.settings,
                   l.last_synced_at, l.deleted_at
            FROM chat_sync_channel_links l
            JOIN sync_connections c ON c.id = l.sync_connection_id
            WHERE l.hazel_channel_id = $1
              AND l.is_active
              AND l.deleted_at IS NULL
              AND c.provider = $2
              AND c.status = 'active'
            ORDER BY l.id
            "#,
        )
        .bind(hazel_channel_id)
        .bind(provider)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_channel_links(&self, sync_connection_id: Uuid) -> StoreResult<Vec<ChannelLink>> {
        let rows = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT id, sync_connection_id, hazel_channel_id, external_channel_id,
                   external_channel_name, direction, is_active, settings,
                   last_synced_at, deleted_at
            FROM chat_sync_channel_links
            WHERE sync_connection_id = $1
              AND is_active
              AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(sync_connection_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn insert_channel_link(&self, link: NewChannelLink) -> StoreResult<ChannelLink> {
        let inserted = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            INSERT INTO chat_sync_channel_links
                (id, sync_connection_id, hazel_channel_id, external_channel_id,
                 external_channel_name, direction, is_active, settings, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, NOW())
            ON CONFLICT DO NOTHING
            RETURNING id, sync_connection_id, hazel_channel_id, external_channel_id,
                      external_channel_name, direction, is_active, settings,
                      last_synced_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(link.sync_connection_id)
        .bind(link.hazel_channel_id)
        .bind(&link.external_channel_id)
        .bind(&link.external_channel_name)
        .bind(link.direction.as_str())
        .bind(Json(&link.settings))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return ChannelLink::try_from(row);
        }

        // Lost the race: return whichever live link holds the slot
        let existing = sqlx::query_as::<_, ChannelLinkRow>(
            r#"
            SELECT id, sync_connection_id, hazel_channel_id, external_channel_id,
                   external_channel_name, direction, is_active, settings,
                   last_synced_at, deleted_at
            FROM chat_sync_channel_links
            WHERE sync_connection_id = $1
              AND (hazel_channel_id = $2 OR external_channel_id = $3)
              AND is_active
              AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(link.sync_connection_id)
        .bind(link.hazel_channel_id)
        .bind(&link.external_channel_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            "[Store] Channel link insert converged on existing link {}",
            existing.id
        );
        ChannelLink::try_from(existing)
    }

    async fn touch_channel_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE chat_sync_channel_links SET last_synced_at = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_message_link_by_hazel_message(
        &self,
        channel_link_id: Uuid,
        hazel_message_id: Uuid,
    ) -> StoreResult<Option<MessageLink>> {
        let row = sqlx::query_as::<_, MessageLinkRow>(
            r#"
            SELECT id, channel_link_id, hazel_message_id, external_message_id, origin,
                   root_hazel_message_id, root_external_message_id, last_synced_at, deleted_at
            FROM chat_sync_message_links
            WHERE channel_link_id = $1
              AND hazel_message_id = $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(channel_link_id)
        .bind(hazel_message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MessageLink::try_from).transpose()
    }

    async fn find_message_link_by_external_message(
        &self,
        channel_link_id: Uuid,
        external_message_id: &str,
    ) -> StoreResult<Option<MessageLink>> {
        let row = sqlx::query_as::<_, MessageLinkRow>(
            r#"
            SELECT id, channel_link_id, hazel_message_id, external_message_id, origin,
                   root_hazel_message_id, root_external_message_id, last_synced_at, deleted_at
            FROM chat_sync_message_links
            WHERE channel_link_id = $1
              AND external_message_id = $2
              AND deleted_at IS NULL
            "#,
        )
        .bind(channel_link_id)
        .bind(external_message_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MessageLink::try_from).transpose()
    }

    async fn insert_message_link(&self, link: NewMessageLink) -> StoreResult<MessageLink> {
        let inserted = sqlx::query_as::<_, MessageLinkRow>(
            r#"
            INSERT INTO chat_sync_message_links
                (id, channel_link_id, hazel_message_id, external_message_id, origin,
                 root_hazel_message_id, root_external_message_id, last_synced_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            ON CONFLICT DO NOTHING
            RETURNING id, channel_link_id, hazel_message_id, external_message_id, origin,
                      root_hazel_message_id, root_external_message_id, last_synced_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(link.channel_link_id)
        .bind(link.hazel_message_id)
        .bind(&link.external_message_id)
        .bind(link.origin.as_str())
        .bind(link.root_hazel_message_id)
        .bind(&link.root_external_message_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return MessageLink::try_from(row);
        }

        let existing = sqlx::query_as::<_, MessageLinkRow>(
            r#"
            SELECT id, channel_link_id, hazel_message_id, external_message_id, origin,
                   root_hazel_message_id, root_external_message_id, last_synced_at, deleted_at
            FROM chat_sync_message_links
            WHERE channel_link_id = $1
              AND (hazel_message_id = $2 OR external_message_id = $3)
              AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(link.channel_link_id)
        .bind(link.hazel_message_id)
        .bind(&link.external_message_id)
        .fetch_one(&self.pool)
        .await?;

        MessageLink::try_from(existing)
    }

    async fn touch_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE chat_sync_message_links SET last_synced_at = $2 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn soft_delete_message_link(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE chat_sync_message_links
            SET deleted_at = $2, last_synced_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
