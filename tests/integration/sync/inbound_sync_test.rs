//! Inbound sync integration tests
//!
//! External platform events written into the in-memory store: shadow users,
//! webhook echo suppression, edits, deletes, reactions and threads.

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use hazel_sync::backend::chat_sync::{
    ExternalAuthor, IgnoreReason, InboundMessage, InboundMessageDelete, InboundMessageUpdate,
    InboundReaction, InboundThread, SyncOutcome,
};
use hazel_sync::backend::error::SyncError;
use hazel_sync::shared::models::{ChannelType, EventSource, MessageOrigin, SyncDirection, User};
use pretty_assertions::assert_eq;

use crate::common::*;

fn author(id: &str) -> ExternalAuthor {
    ExternalAuthor {
        external_user_id: id.to_string(),
        display_name: Some("Grace".to_string()),
        avatar_url: Some("https://cdn.discordapp.com/avatars/grace.png".to_string()),
    }
}

fn inbound(external_message_id: &str, content: &str) -> InboundMessage {
    InboundMessage {
        external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
        external_message_id: external_message_id.to_string(),
        content: content.to_string(),
        author: author("4242"),
        reply_to_external_message_id: None,
        external_webhook_id: None,
        dedupe_key: None,
    }
}

fn reaction(external_message_id: &str, emoji: &str) -> InboundReaction {
    InboundReaction {
        external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
        external_message_id: external_message_id.to_string(),
        user: author("4242"),
        emoji: emoji.to_string(),
        dedupe_key: None,
    }
}

async fn shadow_user(world: &World, external_id: &str) -> User {
    world
        .store
        .users()
        .await
        .into_iter()
        .find(|user| user.external_id == external_id)
        .unwrap()
}

#[tokio::test]
async fn test_create_writes_message_as_shadow_user() {
    let world = World::new().await;

    let outcome = assert_ok!(
        world
            .worker
            .ingest_message_create(world.connection.id, inbound("300000000000000001", "hi hazel"))
            .await
    );
    assert!(outcome.is_synced());

    let shadow = world
        .store
        .users()
        .await
        .into_iter()
        .find(|user| user.external_id == "discord-user-4242")
        .unwrap();
    assert_eq!(shadow.display_name, "Grace");
    assert_eq!(
        shadow.avatar_url,
        "https://cdn.discordapp.com/avatars/grace.png"
    );

    let messages = world.store.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel_id, world.channel.id);
    assert_eq!(messages[0].author_id, shadow.id);
    assert_eq!(messages[0].content, "hi hazel");

    let links = world.store.message_links().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].origin, MessageOrigin::External);
    assert_eq!(links[0].external_message_id, "300000000000000001");

    // Shadow users join the organization so access propagation sees them
    world.access.sync_channel(world.channel.id).await.unwrap();
    let rows = world.store.access_rows().await;
    assert!(rows.iter().any(|row| row.user_id == shadow.id));

    let receipts = world.store.receipts().await;
    assert_eq!(receipts[0].source, EventSource::External);
    assert_eq!(world.provider.call_count(), 0);
}

#[tokio::test]
async fn test_create_reuses_linked_identity() {
    let world = World::new().await;
    world
        .store
        .put_identity_link(MOCK_PROVIDER, "4242", world.author.id)
        .await;

    world
        .worker
        .ingest_message_create(world.connection.id, inbound("300000000000000002", "me again"))
        .await
        .unwrap();

    assert_eq!(world.store.users().await.len(), 1);
    assert_eq!(world.store.messages().await[0].author_id, world.author.id);
}

#[tokio::test]
async fn test_missing_author_metadata_falls_back() {
    let world = World::new().await;
    let mut event = inbound("300000000000000003", "anonymous");
    event.author = ExternalAuthor {
        external_user_id: "99".to_string(),
        display_name: None,
        avatar_url: None,
    };

    world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();

    let shadow = world
        .store
        .users()
        .await
        .into_iter()
        .find(|user| user.external_id == "discord-user-99")
        .unwrap();
    assert_eq!(shadow.display_name, "External User");
    assert_eq!(shadow.avatar_url, "");
}

#[tokio::test]
async fn test_own_webhook_post_is_dropped_before_link_lookup() {
    let mut world = World::new().await;
    world.set_link_settings(webhook_settings()).await;
    let mut event = inbound("300000000000000004", "echo");
    event.external_webhook_id = Some(OWN_WEBHOOK_ID.to_string());

    let outcome = world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::WebhookOrigin));
    assert_eq!(world.store.stats().message_link_reads(), 0);
    assert!(world.store.messages().await.is_empty());
}

#[tokio::test]
async fn test_foreign_webhook_post_is_ingested() {
    let mut world = World::new().await;
    world.set_link_settings(webhook_settings()).await;
    let mut event = inbound("300000000000000005", "from a bot");
    event.external_webhook_id = Some("123".to_string());

    let outcome = world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();

    assert!(outcome.is_synced());
}

#[tokio::test]
async fn test_unlinked_external_channel_is_not_found() {
    let world = World::new().await;
    let mut event = inbound("300000000000000006", "lost");
    event.external_channel_id = "555".to_string();

    let err = world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap_err();

    assert_matches!(err, SyncError::NotFound { entity: "channel link", .. });
}

#[tokio::test]
async fn test_outbound_only_link_skips_inbound() {
    let world = World::with_direction(SyncDirection::HazelToExternal).await;

    let outcome = world
        .worker
        .ingest_message_create(world.connection.id, inbound("300000000000000007", "no"))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::Direction));
    assert!(world.store.messages().await.is_empty());
}

#[tokio::test]
async fn test_redelivered_create_is_deduped() {
    let world = World::new().await;
    let event = inbound("300000000000000008", "twice");

    world
        .worker
        .ingest_message_create(world.connection.id, event.clone())
        .await
        .unwrap();
    let replay = world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();

    assert_eq!(replay, SyncOutcome::Deduped);
    assert_eq!(world.store.messages().await.len(), 1);
}

#[tokio::test]
async fn test_reply_links_to_mirrored_parent() {
    let world = World::new().await;
    let parent = world.post_mirrored("question", "300000000000000009").await;
    let mut event = inbound("300000000000000010", "answer");
    event.reply_to_external_message_id = Some("300000000000000009".to_string());

    world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();

    let reply = world
        .store
        .messages()
        .await
        .into_iter()
        .find(|message| message.content == "answer")
        .unwrap();
    assert_eq!(reply.reply_to_message_id, Some(parent.id));
}

#[tokio::test]
async fn test_update_rewrites_content() {
    let world = World::new().await;
    let message = world.post_mirrored("draft", "300000000000000011").await;
    let edited_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    let outcome = world
        .worker
        .ingest_message_update(
            world.connection.id,
            InboundMessageUpdate {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "300000000000000011".to_string(),
                content: "final".to_string(),
                edited_at: Some(edited_at),
                external_webhook_id: None,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::synced(message.id, "300000000000000011"));
    let stored = world
        .store
        .messages()
        .await
        .into_iter()
        .find(|m| m.id == message.id)
        .unwrap();
    assert_eq!(stored.content, "final");
    assert_eq!(stored.updated_at, edited_at);
}

#[tokio::test]
async fn test_update_without_link_is_ignored() {
    let world = World::new().await;

    let outcome = world
        .worker
        .ingest_message_update(
            world.connection.id,
            InboundMessageUpdate {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "404".to_string(),
                content: "?".to_string(),
                edited_at: None,
                external_webhook_id: None,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::NoMessageLink));
}

#[tokio::test]
async fn test_delete_soft_deletes_message_and_link() {
    let world = World::new().await;
    let message = world.post_mirrored("gone soon", "300000000000000012").await;

    let outcome = world
        .worker
        .ingest_message_delete(
            world.connection.id,
            InboundMessageDelete {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "300000000000000012".to_string(),
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    assert!(outcome.is_synced());
    let stored = world
        .store
        .messages()
        .await
        .into_iter()
        .find(|m| m.id == message.id)
        .unwrap();
    assert!(stored.deleted_at.is_some());
    assert!(world.store.message_links().await[0].deleted_at.is_some());
}

#[tokio::test]
async fn test_delete_without_link_is_ignored() {
    let world = World::new().await;

    let outcome = world
        .worker
        .ingest_message_delete(
            world.connection.id,
            InboundMessageDelete {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "404".to_string(),
                dedupe_key: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::NoMessageLink));
}

#[tokio::test]
async fn test_reaction_add_and_remove() {
    let world = World::new().await;
    let message = world.post_mirrored("react", "300000000000000013").await;

    let added = world
        .worker
        .ingest_reaction_add(world.connection.id, reaction("300000000000000013", "🔥"))
        .await
        .unwrap();
    assert!(added.is_synced());

    let reactions = world.store.reactions().await;
    assert_eq!(reactions.len(), 1);
    assert_eq!(reactions[0].message_id, message.id);
    assert_eq!(reactions[0].channel_id, world.channel.id);
    assert_eq!(reactions[0].emoji, "🔥");

    let reactor = shadow_user(&world, "discord-user-4242").await;
    assert_eq!(reactions[0].user_id, reactor.id);
    assert_eq!(reactor.display_name, "Grace");
    assert_eq!(
        reactor.avatar_url,
        "https://cdn.discordapp.com/avatars/grace.png"
    );

    let removed = world
        .worker
        .ingest_reaction_remove(world.connection.id, reaction("300000000000000013", "🔥"))
        .await
        .unwrap();
    assert!(removed.is_synced());
    assert!(world.store.reactions().await.is_empty());
}

#[tokio::test]
async fn test_reaction_without_metadata_falls_back() {
    let world = World::new().await;
    world.post_mirrored("react", "300000000000000015").await;
    let mut event = reaction("300000000000000015", "👀");
    event.user = ExternalAuthor {
        external_user_id: "99".to_string(),
        display_name: None,
        avatar_url: None,
    };

    let added = world
        .worker
        .ingest_reaction_add(world.connection.id, event)
        .await
        .unwrap();
    assert!(added.is_synced());

    let reactor = shadow_user(&world, "discord-user-99").await;
    assert_eq!(reactor.display_name, "External User");
    assert_eq!(reactor.avatar_url, "");
    assert_eq!(world.store.reactions().await[0].user_id, reactor.id);
}

#[tokio::test]
async fn test_reaction_without_avatar_keeps_stored_avatar() {
    let world = World::new().await;
    world.post_mirrored("react", "300000000000000016").await;
    world
        .worker
        .ingest_reaction_add(world.connection.id, reaction("300000000000000016", "🔥"))
        .await
        .unwrap();

    // Same account, renamed, with no avatar in the payload
    let mut event = reaction("300000000000000016", "🎉");
    event.user = ExternalAuthor {
        external_user_id: "4242".to_string(),
        display_name: Some("Grace H.".to_string()),
        avatar_url: None,
    };
    world
        .worker
        .ingest_reaction_add(world.connection.id, event)
        .await
        .unwrap();

    let reactor = shadow_user(&world, "discord-user-4242").await;
    assert_eq!(reactor.display_name, "Grace H.");
    assert_eq!(
        reactor.avatar_url,
        "https://cdn.discordapp.com/avatars/grace.png"
    );
    let shadows = world
        .store
        .users()
        .await
        .into_iter()
        .filter(|user| user.external_id.starts_with("discord-user-"))
        .count();
    assert_eq!(shadows, 1);
}

#[tokio::test]
async fn test_reaction_on_unmirrored_message_is_ignored() {
    let world = World::new().await;

    let outcome = world
        .worker
        .ingest_reaction_add(world.connection.id, reaction("404", "👍"))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::NoMessageLink));
    assert!(world.store.reactions().await.is_empty());
}

fn thread_event(root: &str) -> InboundThread {
    InboundThread {
        external_parent_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
        external_thread_id: "310000000000000001".to_string(),
        external_root_message_id: root.to_string(),
        name: "design review".to_string(),
        dedupe_key: None,
    }
}

#[tokio::test]
async fn test_thread_create_adds_thread_channel_and_link() {
    let world = World::new().await;
    let root = world.post_mirrored("root", "300000000000000014").await;
    world.access.sync_channel(world.channel.id).await.unwrap();

    let outcome = world
        .worker
        .ingest_thread_create(world.connection.id, thread_event("300000000000000014"))
        .await
        .unwrap();
    assert!(outcome.is_synced());

    let thread = world
        .store
        .channels()
        .await
        .into_iter()
        .find(|channel| channel.channel_type == ChannelType::Thread)
        .unwrap();
    assert_eq!(thread.parent_channel_id, Some(world.channel.id));
    assert_eq!(thread.thread_root_message_id, Some(root.id));
    assert_eq!(thread.name, "design review");

    let link = world
        .store
        .channel_links()
        .await
        .into_iter()
        .find(|link| link.hazel_channel_id == thread.id)
        .unwrap();
    assert_eq!(link.external_channel_id, "310000000000000001");
    assert!(link.settings.is_thread_link());

    // Public parent, so every organization member can read the thread
    let rows = world.store.access_rows().await;
    assert!(rows
        .iter()
        .any(|row| row.channel_id == thread.id && row.user_id == world.author.id));

    // Messages posted in the thread land in the thread channel with roots set
    let mut event = inbound("300000000000000015", "inside");
    event.external_channel_id = "310000000000000001".to_string();
    world
        .worker
        .ingest_message_create(world.connection.id, event)
        .await
        .unwrap();
    let message_link = world
        .store
        .message_links()
        .await
        .into_iter()
        .find(|link| link.external_message_id == "300000000000000015")
        .unwrap();
    assert_eq!(message_link.root_hazel_message_id, Some(root.id));
    assert_eq!(
        message_link.root_external_message_id.as_deref(),
        Some("310000000000000001")
    );
}

#[tokio::test]
async fn test_thread_create_for_linked_thread_is_already_linked() {
    let world = World::new().await;
    world.post_mirrored("root", "300000000000000016").await;

    world
        .worker
        .ingest_thread_create(world.connection.id, thread_event("300000000000000016"))
        .await
        .unwrap();
    let mut again = thread_event("300000000000000016");
    again.dedupe_key = Some("gateway-replay".to_string());
    let outcome = world
        .worker
        .ingest_thread_create(world.connection.id, again)
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::AlreadyLinked);
}

#[tokio::test]
async fn test_thread_from_unmirrored_root_is_ignored() {
    let world = World::new().await;

    let outcome = world
        .worker
        .ingest_thread_create(world.connection.id, thread_event("404"))
        .await
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Ignored(IgnoreReason::NoMessageLink));
    assert_eq!(world.store.channels().await.len(), 1);
}
