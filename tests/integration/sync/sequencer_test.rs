//! Commit-order sequencer and change dispatcher tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hazel_sync::backend::error::SyncError;
use hazel_sync::backend::sequencer::{process_in_commit_order, ChangeDispatcher, ChangeHandler};
use hazel_sync::shared::change_event::{ChangeAction, ChangeBatch, ChangeEvent, ChangeMetadata};
use hazel_sync::shared::models::{ChannelType, MessageReaction};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::*;

fn event(table: &str, action: ChangeAction, record: Value, second: u32, lsn: i64, idx: i64) -> ChangeEvent {
    ChangeEvent {
        record,
        metadata: ChangeMetadata {
            table_name: table.to_string(),
            commit_timestamp: Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, second).unwrap(),
            commit_lsn: lsn,
            commit_idx: idx,
            idempotency_key: None,
        },
        action,
        changes: None,
    }
}

/// Records the ids it sees and fails on the ones listed
#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<String>>,
    fail_on: Vec<String>,
}

#[async_trait]
impl ChangeHandler for RecordingHandler {
    async fn handle(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let id = event.record_id();
        self.seen.lock().unwrap().push(id.clone());
        if self.fail_on.contains(&id) {
            return Err(SyncError::configuration(format!("cannot handle {}", id)));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_events_are_handled_in_commit_order() {
    let handler = RecordingHandler::default();
    let events = vec![
        event("messages", ChangeAction::Insert, json!({"id": "d"}), 2, 10, 0),
        event("messages", ChangeAction::Insert, json!({"id": "c"}), 1, 20, 1),
        event("messages", ChangeAction::Insert, json!({"id": "b"}), 1, 20, 0),
        event("messages", ChangeAction::Insert, json!({"id": "a"}), 1, 10, 0),
    ];

    let outcome = process_in_commit_order(events, &handler).await;

    assert_eq!(outcome.total, 4);
    assert_eq!(*handler.seen.lock().unwrap(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_failed_event_does_not_stop_the_batch() {
    let handler = RecordingHandler {
        fail_on: vec!["2".to_string()],
        ..RecordingHandler::default()
    };
    let events = vec![
        event("messages", ChangeAction::Insert, json!({"id": 3}), 3, 1, 0),
        event("messages", ChangeAction::Insert, json!({"id": 2}), 2, 1, 0),
        event("messages", ChangeAction::Insert, json!({"id": 1}), 1, 1, 0),
    ];

    let outcome = process_in_commit_order(events, &handler).await;

    assert_eq!(outcome.total, 3);
    assert_eq!(*handler.seen.lock().unwrap(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_empty_batch() {
    let handler = RecordingHandler::default();
    let outcome = process_in_commit_order(Vec::new(), &handler).await;
    assert_eq!(outcome.total, 0);
}

fn dispatcher(world: &World) -> ChangeDispatcher {
    ChangeDispatcher::new(world.worker.clone(), world.access.clone())
}

#[tokio::test]
async fn test_message_insert_then_reaction_in_one_batch() {
    let world = World::new().await;
    let message = world.post("cdc message", 5).await;
    let reaction = MessageReaction {
        id: Uuid::new_v4(),
        message_id: message.id,
        channel_id: world.channel.id,
        user_id: world.author.id,
        emoji: "👀".to_string(),
    };
    world.store.put_reaction(reaction.clone()).await;

    // Delivered out of order; the reaction needs the message link
    let batch = ChangeBatch {
        data: vec![
            event(
                "message_reactions",
                ChangeAction::Insert,
                json!({"id": reaction.id, "message_id": message.id, "user_id": world.author.id, "emoji": "👀"}),
                2,
                100,
                0,
            ),
            event(
                "messages",
                ChangeAction::Insert,
                json!({"id": message.id, "channel_id": world.channel.id}),
                1,
                100,
                0,
            ),
        ],
    };

    let outcome = dispatcher(&world).process_batch(batch).await;

    assert_eq!(outcome.total, 2);
    let calls = world.provider.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], ProviderCall::CreateMessage(_)));
    assert!(matches!(calls[1], ProviderCall::AddReaction { .. }));
}

#[tokio::test]
async fn test_redelivered_batch_is_absorbed() {
    let world = World::new().await;
    let message = world.post("once only", 5).await;
    let batch = ChangeBatch {
        data: vec![event(
            "messages",
            ChangeAction::Insert,
            json!({"id": message.id, "channel_id": world.channel.id}),
            1,
            7,
            0,
        )],
    };

    let dispatcher = dispatcher(&world);
    dispatcher.process_batch(batch.clone()).await;
    dispatcher.process_batch(batch).await;

    assert_eq!(world.provider.call_count(), 1);
}

#[tokio::test]
async fn test_soft_delete_update_is_a_delete() {
    let world = World::new().await;
    let message = world.post_mirrored("to be removed", "800000000000000020").await;
    let batch = ChangeBatch {
        data: vec![event(
            "messages",
            ChangeAction::Update,
            json!({
                "id": message.id,
                "channel_id": world.channel.id,
                "deleted_at": "2026-05-01T09:00:01Z"
            }),
            1,
            8,
            0,
        )],
    };

    dispatcher(&world).process_batch(batch).await;

    assert_eq!(
        world.provider.calls(),
        vec![ProviderCall::DeleteMessage {
            channel_id: EXTERNAL_CHANNEL_ID.to_string(),
            message_id: "800000000000000020".to_string(),
            via_webhook: false,
        }]
    );
}

#[tokio::test]
async fn test_reaction_delete_uses_record_fields() {
    let world = World::new().await;
    let message = world.post_mirrored("react", "800000000000000021").await;
    let batch = ChangeBatch {
        data: vec![event(
            "message_reactions",
            ChangeAction::Delete,
            json!({
                "id": Uuid::new_v4(),
                "message_id": message.id,
                "channel_id": world.channel.id,
                "user_id": world.author.id,
                "emoji": "👋"
            }),
            1,
            9,
            0,
        )],
    };

    dispatcher(&world).process_batch(batch).await;

    assert_eq!(
        world.provider.calls(),
        vec![ProviderCall::RemoveReaction {
            channel_id: EXTERNAL_CHANNEL_ID.to_string(),
            message_id: "800000000000000021".to_string(),
            emoji: "👋".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_malformed_record_is_skipped() {
    let world = World::new().await;
    let message = world.post("valid", 5).await;
    let batch = ChangeBatch {
        data: vec![
            event("messages", ChangeAction::Insert, json!({"id": "not-a-uuid"}), 1, 1, 0),
            event(
                "messages",
                ChangeAction::Insert,
                json!({"id": message.id, "channel_id": world.channel.id}),
                2,
                1,
                0,
            ),
        ],
    };

    let outcome = dispatcher(&world).process_batch(batch).await;

    assert_eq!(outcome.total, 2);
    assert_eq!(world.provider.call_count(), 1);
}

#[tokio::test]
async fn test_membership_changes_drive_channel_access() {
    let world = World::new().await;
    let private = channel(world.organization_id, ChannelType::Private);
    world.store.put_channel(private.clone()).await;
    world.store.put_channel_member(private.id, world.author.id).await;

    dispatcher(&world)
        .process_batch(ChangeBatch {
            data: vec![event(
                "channel_members",
                ChangeAction::Insert,
                json!({"id": Uuid::new_v4(), "channel_id": private.id, "user_id": world.author.id}),
                1,
                1,
                0,
            )],
        })
        .await;
    assert!(world
        .store
        .access_rows()
        .await
        .iter()
        .any(|row| row.channel_id == private.id && row.user_id == world.author.id));

    // Leaving the organization removes every row for the user
    world
        .store
        .remove_organization_member(world.organization_id, world.author.id)
        .await;
    dispatcher(&world)
        .process_batch(ChangeBatch {
            data: vec![event(
                "organization_members",
                ChangeAction::Delete,
                json!({
                    "id": Uuid::new_v4(),
                    "organization_id": world.organization_id,
                    "user_id": world.author.id
                }),
                2,
                2,
                0,
            )],
        })
        .await;
    assert!(world
        .store
        .access_rows()
        .await
        .iter()
        .all(|row| row.user_id != world.author.id));
}

#[tokio::test]
async fn test_thread_insert_is_offered_to_providers() {
    let world = World::new().await;
    let root = world.post_mirrored("root", "800000000000000022").await;
    let thread = thread(&world.channel, root.id);
    world.store.put_channel(thread.clone()).await;

    dispatcher(&world)
        .process_batch(ChangeBatch {
            data: vec![event(
                "channels",
                ChangeAction::Insert,
                json!({
                    "id": thread.id,
                    "type": "thread",
                    "parent_channel_id": world.channel.id
                }),
                1,
                1,
                0,
            )],
        })
        .await;

    assert!(world
        .provider
        .calls()
        .iter()
        .any(|call| matches!(call, ProviderCall::CreateThread { .. })));
}

#[tokio::test]
async fn test_unknown_tables_are_ignored() {
    let world = World::new().await;
    let outcome = dispatcher(&world)
        .process_batch(ChangeBatch {
            data: vec![event("invoices", ChangeAction::Insert, json!({"id": 1}), 1, 1, 0)],
        })
        .await;

    assert_eq!(outcome.total, 1);
    assert_eq!(world.provider.call_count(), 0);
}

#[test]
fn test_dispatcher_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<ChangeDispatcher>>();
}
