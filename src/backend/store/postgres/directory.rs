//! `DirectoryStore` over `users`, `organization_members` and
//! `external_identities`.

use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::backend::store::{DirectoryStore, StoreResult};
use crate::shared::models::{ShadowUserProfile, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    external_id: String,
    display_name: String,
    avatar_url: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            external_id: row.external_id,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(sqlx::FromRow)]
struct IdRow {
    id: Uuid,
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, external_id, display_name, avatar_url FROM users WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn upsert_user_by_external_id(&self, profile: ShadowUserProfile) -> StoreResult<User> {
        // With sync_avatar off an existing avatar is kept
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, external_id, display_name, avatar_url, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            ON CONFLICT (external_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                avatar_url = CASE WHEN $5 THEN EXCLUDED.avatar_url ELSE users.avatar_url END,
                updated_at = NOW()
            RETURNING id, external_id, display_name, avatar_url
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&profile.external_id)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(profile.sync_avatar)
        .fetch_one(&self.pool)
        .await?;

        Ok(User::from(row))
    }

    async fn ensure_organization_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organization_members (organization_id, user_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (organization_id, user_id) DO UPDATE SET deleted_at = NULL
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_member_ids(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT user_id AS id
            FROM organization_members
            WHERE organization_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn is_active_member(&self, organization_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let row = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT user_id AS id
            FROM organization_members
            WHERE organization_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn find_linked_user(
        &self,
        provider: &str,
        external_user_id: &str,
    ) -> StoreResult<Option<Uuid>> {
        let row = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT user_id AS id
            FROM external_identities
            WHERE provider = $1 AND external_user_id = $2
            "#,
        )
        .bind(provider)
        .bind(external_user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.id))
    }
}
