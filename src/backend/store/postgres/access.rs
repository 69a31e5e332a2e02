//! `AccessStore` over `channel_access`. Both replacements run in a single
//! transaction so readers never observe a half-applied set.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use super::PgStore;
use crate::backend::store::{AccessDiff, AccessStore, StoreResult};

#[derive(sqlx::FromRow)]
struct IdRow {
    id: Uuid,
}

#[async_trait]
impl AccessStore for PgStore {
    async fn list_channel_user_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT user_id AS id FROM channel_access WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn list_user_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT channel_id AS id
            FROM channel_access
            WHERE user_id = $1 AND organization_id = $2
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn replace_channel_access(
        &self,
        channel_id: Uuid,
        organization_id: Option<Uuid>,
        user_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff> {
        let users: Vec<Uuid> = user_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM channel_access
            WHERE channel_id = $1 AND user_id <> ALL($2)
            "#,
        )
        .bind(channel_id)
        .bind(&users)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut inserted = 0;
        if let Some(organization_id) = organization_id {
            inserted = sqlx::query(
                r#"
                INSERT INTO channel_access (user_id, channel_id, organization_id, updated_at)
                SELECT u, $1, $2, NOW() FROM unnest($3::uuid[]) AS u
                ON CONFLICT (user_id, channel_id) DO NOTHING
                "#,
            )
            .bind(channel_id)
            .bind(organization_id)
            .bind(&users)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            sqlx::query(
                r#"
                UPDATE channel_access
                SET updated_at = NOW(), organization_id = $2
                WHERE channel_id = $1 AND user_id = ANY($3)
                "#,
            )
            .bind(channel_id)
            .bind(organization_id)
            .bind(&users)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(AccessDiff {
            inserted: inserted as usize,
            deleted: deleted as usize,
        })
    }

    async fn replace_user_access(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        channel_ids: &HashSet<Uuid>,
    ) -> StoreResult<AccessDiff> {
        let channels: Vec<Uuid> = channel_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM channel_access
            WHERE user_id = $1 AND organization_id = $2 AND channel_id <> ALL($3)
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(&channels)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let inserted = sqlx::query(
            r#"
            INSERT INTO channel_access (user_id, channel_id, organization_id, updated_at)
            SELECT $1, c, $2, NOW() FROM unnest($3::uuid[]) AS c
            ON CONFLICT (user_id, channel_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(&channels)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            UPDATE channel_access
            SET updated_at = NOW()
            WHERE user_id = $1 AND channel_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(&channels)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AccessDiff {
            inserted: inserted as usize,
            deleted: deleted as usize,
        })
    }
}
