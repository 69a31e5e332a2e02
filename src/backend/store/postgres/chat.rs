//! `ChatStore` over the collaborator tables `channels`, `channel_members`,
//! `messages` and `message_reactions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{convert_all, ChannelRow, MessageRow, PgStore};
use crate::backend::store::{ChatStore, StoreResult};
use crate::shared::models::{
    Channel, ChannelType, Message, MessageReaction, NewMessage, NewThreadChannel,
    ReactionSnapshot,
};

#[derive(sqlx::FromRow)]
struct ReactionRow {
    id: Uuid,
    message_id: Uuid,
    channel_id: Uuid,
    user_id: Uuid,
    emoji: String,
}

impl From<ReactionRow> for MessageReaction {
    fn from(row: ReactionRow) -> Self {
        MessageReaction {
            id: row.id,
            message_id: row.message_id,
            channel_id: row.channel_id,
            user_id: row.user_id,
            emoji: row.emoji,
        }
    }
}

#[derive(sqlx::FromRow)]
struct IdRow {
    id: Uuid,
}

#[async_trait]
impl ChatStore for PgStore {
    async fn find_channel(&self, id: Uuid) -> StoreResult<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, organization_id, name, type AS channel_type,
                   parent_channel_id, thread_root_message_id, deleted_at
            FROM channels
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Channel::try_from).transpose()
    }

    async fn list_organization_channels(&self, organization_id: Uuid) -> StoreResult<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, organization_id, name, type AS channel_type,
                   parent_channel_id, thread_root_message_id, deleted_at
            FROM channels
            WHERE organization_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_child_threads(&self, parent_channel_id: Uuid) -> StoreResult<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            r#"
            SELECT id, organization_id, name, type AS channel_type,
                   parent_channel_id, thread_root_message_id, deleted_at
            FROM channels
            WHERE parent_channel_id = $1 AND type = 'thread' AND deleted_at IS NULL
            "#,
        )
        .bind(parent_channel_id)
        .fetch_all(&self.pool)
        .await?;

        convert_all(rows)
    }

    async fn list_channel_member_ids(&self, channel_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT user_id AS id FROM channel_members WHERE channel_id = $1
            "#,
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn list_member_channel_ids(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, IdRow>(
            r#"
            SELECT c.id
            FROM channel_members m
            JOIN channels c ON c.id = m.channel_id
            WHERE m.user_id = $1
              AND c.organization_id = $2
              AND c.deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn insert_thread_channel(&self, thread: NewThreadChannel) -> StoreResult<Channel> {
        let row = sqlx::query_as::<_, ChannelRow>(
            r#"
            INSERT INTO channels
                (id, organization_id, name, type, parent_channel_id, thread_root_message_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, organization_id, name, type AS channel_type,
                      parent_channel_id, thread_root_message_id, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(thread.organization_id)
        .bind(&thread.name)
        .bind(ChannelType::Thread.as_str())
        .bind(thread.parent_channel_id)
        .bind(thread.thread_root_message_id)
        .fetch_one(&self.pool)
        .await?;

        Channel::try_from(row)
    }

    async fn find_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, channel_id, author_id, content, reply_to_message_id,
                   created_at, updated_at, deleted_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Message::from))
    }

    async fn list_unlinked_messages(
        &self,
        channel_id: Uuid,
        channel_link_id: Uuid,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.channel_id, m.author_id, m.content, m.reply_to_message_id,
                   m.created_at, m.updated_at, m.deleted_at
            FROM messages m
            WHERE m.channel_id = $1
              AND m.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM chat_sync_message_links l
                  WHERE l.channel_link_id = $2
                    AND l.hazel_message_id = m.id
                    AND l.deleted_at IS NULL
              )
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $3
            "#,
        )
        .bind(channel_id)
        .bind(channel_link_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn insert_message(&self, message: NewMessage) -> StoreResult<Message> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages
                (id, channel_id, author_id, content, reply_to_message_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, channel_id, author_id, content, reply_to_message_id,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.channel_id)
        .bind(message.author_id)
        .bind(&message.content)
        .bind(message.reply_to_message_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message::from(row))
    }

    async fn update_message_content(
        &self,
        id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE messages SET content = $2, updated_at = $3 WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn soft_delete_message(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE messages SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_reaction(&self, id: Uuid) -> StoreResult<Option<MessageReaction>> {
        let row = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT id, message_id, channel_id, user_id, emoji
            FROM message_reactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(MessageReaction::from))
    }

    async fn insert_reaction(&self, reaction: ReactionSnapshot) -> StoreResult<MessageReaction> {
        let inserted = sqlx::query_as::<_, ReactionRow>(
            r#"
            INSERT INTO message_reactions (id, message_id, channel_id, user_id, emoji, created_at)
            SELECT $1, m.id, m.channel_id, $3, $4, NOW()
            FROM messages m
            WHERE m.id = $2
            ON CONFLICT (message_id, user_id, emoji) DO NOTHING
            RETURNING id, message_id, channel_id, user_id, emoji
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reaction.message_id)
        .bind(reaction.user_id)
        .bind(&reaction.emoji)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(MessageReaction::from(row));
        }

        let existing = sqlx::query_as::<_, ReactionRow>(
            r#"
            SELECT id, message_id, channel_id, user_id, emoji
            FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(reaction.message_id)
        .bind(reaction.user_id)
        .bind(&reaction.emoji)
        .fetch_one(&self.pool)
        .await?;

        Ok(MessageReaction::from(existing))
    }

    async fn delete_reaction(&self, reaction: &ReactionSnapshot) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#,
        )
        .bind(reaction.message_id)
        .bind(reaction.user_id)
        .bind(&reaction.emoji)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
