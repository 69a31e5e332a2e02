//! Fan-out and backfill integration tests

use assert_matches::assert_matches;
use hazel_sync::backend::chat_sync::{
    ExternalAuthor, FanOutSummary, InboundMessage, InboundReaction,
};
use hazel_sync::backend::error::ProviderError;
use hazel_sync::shared::config::SyncConfig;
use hazel_sync::shared::models::{
    ChannelLink, MessageOrigin, ReactionSnapshot, SyncConnection, SyncConnectionStatus,
    SyncDirection,
};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::common::*;

/// Add a second connection of the same provider linked to the world's channel
async fn second_connection(
    world: &World,
    external_channel_id: &str,
    direction: SyncDirection,
) -> (SyncConnection, ChannelLink) {
    let connection = connection(world.organization_id);
    let link = channel_link(&connection, &world.channel, external_channel_id, direction);
    world.store.put_connection(connection.clone()).await;
    world.store.put_channel_link(link.clone()).await;
    (connection, link)
}

fn grace() -> ExternalAuthor {
    ExternalAuthor {
        external_user_id: "4242".to_string(),
        display_name: Some("Grace".to_string()),
        avatar_url: None,
    }
}

fn summary(synced: usize, failed: usize, skipped: usize) -> FanOutSummary {
    FanOutSummary {
        synced,
        failed,
        skipped,
    }
}

#[tokio::test]
async fn test_create_fans_out_to_every_outbound_connection() {
    let world = World::new().await;
    let (second, _) =
        second_connection(&world, "100000000000000002", SyncDirection::HazelToExternal).await;
    second_connection(&world, "100000000000000003", SyncDirection::ExternalToHazel).await;
    let message = world.post("everyone", 5).await;

    let result = assert_ok!(
        world
            .worker
            .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, None)
            .await
    );

    assert_eq!(result, summary(2, 0, 0));
    let mut channels: Vec<String> = world
        .provider
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::CreateMessage(sent) => Some(sent.channel_id),
            _ => None,
        })
        .collect();
    channels.sort();
    assert_eq!(channels, vec![EXTERNAL_CHANNEL_ID, "100000000000000002"]);

    let connections: Vec<Uuid> = world
        .store
        .receipts()
        .await
        .into_iter()
        .map(|receipt| receipt.sync_connection_id)
        .collect();
    assert!(connections.contains(&world.connection.id));
    assert!(connections.contains(&second.id));
}

#[tokio::test]
async fn test_one_failing_target_does_not_stop_the_others() {
    let world = World::new().await;
    second_connection(&world, "100000000000000002", SyncDirection::Bidirectional).await;
    let message = world.post("partial", 5).await;
    world.provider.fail_next(ProviderError::api(403, "missing access"));

    let result = world
        .worker
        .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, None)
        .await
        .unwrap();

    assert_eq!(result, summary(1, 1, 0));
    assert_eq!(world.provider.call_count(), 2);
}

#[tokio::test]
async fn test_replayed_fan_out_is_skipped() {
    let world = World::new().await;
    second_connection(&world, "100000000000000002", SyncDirection::Bidirectional).await;
    let message = world.post("twice", 5).await;
    let key = Some("cdc:lsn:0/16B6C50:messages:insert".to_string());

    world
        .worker
        .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, key.clone())
        .await
        .unwrap();
    let replay = world
        .worker
        .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, key)
        .await
        .unwrap();

    assert_eq!(replay, summary(0, 0, 2));
    assert_eq!(world.provider.call_count(), 2);
}

#[tokio::test]
async fn test_inactive_connections_are_not_targeted() {
    let world = World::new().await;
    let (mut second, _) =
        second_connection(&world, "100000000000000002", SyncDirection::Bidirectional).await;
    second.status = SyncConnectionStatus::Inactive;
    world.store.put_connection(second).await;
    let message = world.post("only one", 5).await;

    let result = world
        .worker
        .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, None)
        .await
        .unwrap();

    assert_eq!(result, summary(1, 0, 0));
}

#[tokio::test]
async fn test_other_providers_are_not_targeted() {
    let world = World::new().await;
    let message = world.post("discord only", 5).await;

    let result = world
        .worker
        .sync_message_create_to_all_connections("slack", message.id, None)
        .await
        .unwrap();

    assert_eq!(result.total(), 0);
    assert_eq!(world.provider.call_count(), 0);
}

#[tokio::test]
async fn test_update_and_delete_fan_out() {
    let world = World::new().await;
    let message = world.post_mirrored("edit me", "800000000000000010").await;

    let updated = world
        .worker
        .sync_message_update_to_all_connections(MOCK_PROVIDER, message.id, None)
        .await
        .unwrap();
    assert_eq!(updated, summary(1, 0, 0));

    let deleted = world
        .worker
        .sync_message_delete_to_all_connections(MOCK_PROVIDER, message.id, world.channel.id, None)
        .await
        .unwrap();
    assert_eq!(deleted, summary(1, 0, 0));
    assert_eq!(world.provider.call_count(), 2);
}

#[tokio::test]
async fn test_reaction_delete_fan_out_uses_snapshot() {
    let world = World::new().await;
    let message = world.post_mirrored("react", "800000000000000011").await;
    let snapshot = ReactionSnapshot {
        message_id: message.id,
        user_id: world.author.id,
        emoji: "✅".to_string(),
    };

    let result = world
        .worker
        .sync_reaction_delete_to_all_connections(
            MOCK_PROVIDER,
            snapshot,
            world.channel.id,
            None,
        )
        .await
        .unwrap();

    assert_eq!(result, summary(1, 0, 0));
    assert_eq!(
        world.provider.calls(),
        vec![ProviderCall::RemoveReaction {
            channel_id: EXTERNAL_CHANNEL_ID.to_string(),
            message_id: "800000000000000011".to_string(),
            emoji: "✅".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_thread_fan_out_reaches_parent_connections() {
    let world = World::new().await;
    let root = world.post_mirrored("root", "800000000000000012").await;
    let thread = thread(&world.channel, root.id);
    world.store.put_channel(thread.clone()).await;

    let result = world
        .worker
        .sync_thread_create_to_all_connections(MOCK_PROVIDER, thread.id, None)
        .await
        .unwrap();

    assert_eq!(result, summary(1, 0, 0));
    assert!(world
        .store
        .channel_links()
        .await
        .iter()
        .any(|link| link.hazel_channel_id == thread.id));
}

#[tokio::test]
async fn test_message_ingested_on_one_connection_relays_to_another() {
    let world = World::new().await;
    let (_, second_link) =
        second_connection(&world, "100000000000000002", SyncDirection::Bidirectional).await;

    world
        .worker
        .ingest_message_create(
            world.connection.id,
            InboundMessage {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "300000000000000040".to_string(),
                content: "from the first server".to_string(),
                author: grace(),
                reply_to_external_message_id: None,
                external_webhook_id: None,
                dedupe_key: None,
            },
        )
        .await
        .unwrap();
    let message = world.store.messages().await.remove(0);

    // The ingesting connection already holds the link; the other one mirrors it
    let result = assert_ok!(
        world
            .worker
            .sync_message_create_to_all_connections(MOCK_PROVIDER, message.id, None)
            .await
    );
    assert_eq!(result, summary(1, 0, 1));

    assert_matches!(&world.provider.calls()[..], [ProviderCall::CreateMessage(sent)] => {
        assert_eq!(sent.channel_id, "100000000000000002");
        assert_eq!(sent.content, "from the first server");
    });
    let relayed = world
        .store
        .message_links()
        .await
        .into_iter()
        .find(|link| link.channel_link_id == second_link.id)
        .unwrap();
    assert_eq!(relayed.hazel_message_id, message.id);
    assert_eq!(relayed.origin, MessageOrigin::Hazel);
}

#[tokio::test]
async fn test_reaction_ingested_on_one_connection_relays_to_another() {
    let world = World::new().await;
    let (_, second_link) =
        second_connection(&world, "100000000000000002", SyncDirection::Bidirectional).await;
    let message = world.post_mirrored("react here", "800000000000000020").await;
    world
        .store
        .put_message_link(message_link(&second_link, message.id, "800000000000000021"))
        .await;

    world
        .worker
        .ingest_reaction_add(
            world.connection.id,
            InboundReaction {
                external_channel_id: EXTERNAL_CHANNEL_ID.to_string(),
                external_message_id: "800000000000000020".to_string(),
                user: grace(),
                emoji: "🔥".to_string(),
                dedupe_key: None,
            },
        )
        .await
        .unwrap();
    let reaction = world.store.reactions().await.remove(0);

    let result = world
        .worker
        .sync_reaction_create_to_all_connections(MOCK_PROVIDER, reaction.id, None)
        .await
        .unwrap();

    assert_eq!(result, summary(1, 0, 1));
    assert_eq!(
        world.provider.calls(),
        vec![ProviderCall::AddReaction {
            channel_id: "100000000000000002".to_string(),
            message_id: "800000000000000021".to_string(),
            emoji: "🔥".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_backfill_mirrors_only_unlinked_messages() {
    let world = World::new().await;
    world.post_mirrored("already there", "800000000000000013").await;
    let oldest = world.post("first", 300).await;
    let newest = world.post("second", 200).await;

    let result = assert_ok!(world.worker.backfill_connection(world.connection.id).await);
    assert_eq!(result, summary(2, 0, 0));

    let contents: Vec<String> = world
        .provider
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ProviderCall::CreateMessage(sent) => Some(sent.content),
            _ => None,
        })
        .collect();
    assert_eq!(contents, vec!["first", "second"]);

    let linked: Vec<Uuid> = world
        .store
        .message_links()
        .await
        .into_iter()
        .map(|link| link.hazel_message_id)
        .collect();
    assert!(linked.contains(&oldest.id));
    assert!(linked.contains(&newest.id));

    // Nothing left to do on a second run
    let again = world.worker.backfill_connection(world.connection.id).await.unwrap();
    assert_eq!(again.total(), 0);
}

#[tokio::test]
async fn test_backfill_respects_batch_size() {
    let world = World::new().await;
    for i in 0..15 {
        world.post(&format!("message {}", i), 1000 - i).await;
    }

    let result = world
        .worker
        .backfill_connection(world.connection.id)
        .await
        .unwrap();

    assert_eq!(result.synced, test_config().backfill_batch_size);
}

#[tokio::test]
async fn test_backfill_skips_inactive_connection() {
    let mut world = World::new().await;
    world.connection.status = SyncConnectionStatus::Inactive;
    world.store.put_connection(world.connection.clone()).await;
    world.post("waiting", 5).await;

    let result = world
        .worker
        .backfill_connection(world.connection.id)
        .await
        .unwrap();

    assert_eq!(result, FanOutSummary::default());
    assert_eq!(world.provider.call_count(), 0);
}

#[tokio::test]
async fn test_backfill_counts_failures() {
    let world = World::new().await;
    world.post("first", 300).await;
    world.post("second", 200).await;
    world.provider.fail_next(ProviderError::transport("connection reset"));

    let result = world
        .worker
        .backfill_connection(world.connection.id)
        .await
        .unwrap();

    assert_eq!(result, summary(1, 1, 0));
}

#[tokio::test]
async fn test_backfill_moves_past_a_failed_message() {
    let mut world = World::new().await;
    let config = SyncConfig {
        backfill_batch_size: 1,
        ..test_config()
    };
    world.worker = build_worker_with_config(&world.store, &world.provider, &config).0;
    let oldest = world.post("first", 300).await;
    let newest = world.post("second", 200).await;
    world.provider.fail_next(ProviderError::transport("connection reset"));

    let mut runs = Vec::new();
    for _ in 0..3 {
        runs.push(
            world
                .worker
                .backfill_connection(world.connection.id)
                .await
                .unwrap(),
        );
    }

    assert_eq!(runs, vec![summary(0, 1, 0), summary(1, 0, 0), summary(0, 0, 0)]);
    let linked: Vec<_> = world
        .store
        .message_links()
        .await
        .into_iter()
        .map(|link| link.hazel_message_id)
        .collect();
    assert_eq!(linked, vec![newest.id]);
    assert!(!linked.contains(&oldest.id));
}
