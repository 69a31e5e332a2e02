//! Channel-access propagation tests

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use hazel_sync::backend::channel_access::ChannelAccessEngine;
use hazel_sync::backend::store::{MemoryStore, Stores};
use hazel_sync::shared::models::{Channel, ChannelType};
use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::common::{channel, thread, user};

struct Org {
    store: Arc<MemoryStore>,
    engine: ChannelAccessEngine,
    id: Uuid,
    alice: Uuid,
    bob: Uuid,
    carol: Uuid,
}

impl Org {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let engine = ChannelAccessEngine::from_stores(&Stores::from_shared(store.clone()));
        let id = Uuid::new_v4();
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let member = user(name);
            store.put_user(member.clone()).await;
            store.put_organization_member(id, member.id).await;
            ids.push(member.id);
        }
        Self {
            store,
            engine,
            id,
            alice: ids[0],
            bob: ids[1],
            carol: ids[2],
        }
    }

    async fn channel(&self, channel_type: ChannelType, members: &[Uuid]) -> Channel {
        let channel = channel(self.id, channel_type);
        self.store.put_channel(channel.clone()).await;
        for member in members {
            self.store.put_channel_member(channel.id, *member).await;
        }
        channel
    }

    async fn users_of(&self, channel_id: Uuid) -> HashSet<Uuid> {
        self.store
            .access_rows()
            .await
            .into_iter()
            .filter(|row| row.channel_id == channel_id)
            .map(|row| row.user_id)
            .collect()
    }

    async fn channels_of(&self, user_id: Uuid) -> HashSet<Uuid> {
        self.store
            .access_rows()
            .await
            .into_iter()
            .filter(|row| row.user_id == user_id)
            .map(|row| row.channel_id)
            .collect()
    }
}

#[tokio::test]
async fn test_public_channel_is_visible_to_every_member() {
    let org = Org::new().await;
    let public = org.channel(ChannelType::Public, &[]).await;

    let diff = org.engine.sync_channel(public.id).await.unwrap();

    assert_eq!(diff.inserted, 3);
    assert_eq!(
        org.users_of(public.id).await,
        HashSet::from([org.alice, org.bob, org.carol])
    );
}

#[tokio::test]
async fn test_private_channel_is_limited_to_active_members() {
    let org = Org::new().await;
    let private = org.channel(ChannelType::Private, &[org.alice, org.bob]).await;
    org.store.remove_organization_member(org.id, org.bob).await;

    org.engine.sync_channel(private.id).await.unwrap();

    assert_eq!(org.users_of(private.id).await, HashSet::from([org.alice]));
}

#[tokio::test]
async fn test_resync_is_idempotent() {
    let org = Org::new().await;
    let private = org.channel(ChannelType::Direct, &[org.alice, org.carol]).await;

    org.engine.sync_channel(private.id).await.unwrap();
    let again = org.engine.sync_channel(private.id).await.unwrap();

    assert_eq!((again.inserted, again.deleted), (0, 0));
    assert_eq!(org.users_of(private.id).await.len(), 2);
}

#[tokio::test]
async fn test_deleted_channel_has_no_rows() {
    let org = Org::new().await;
    let public = org.channel(ChannelType::Public, &[]).await;
    org.engine.sync_channel(public.id).await.unwrap();

    org.store.delete_channel(public.id, Utc::now()).await;
    let diff = org.engine.sync_channel(public.id).await.unwrap();

    assert_eq!(diff.deleted, 3);
    assert!(org.users_of(public.id).await.is_empty());
}

#[tokio::test]
async fn test_missing_channel_clears_stale_rows() {
    let org = Org::new().await;
    let diff = org.engine.sync_channel(Uuid::new_v4()).await.unwrap();
    assert_eq!((diff.inserted, diff.deleted), (0, 0));
}

#[tokio::test]
async fn test_thread_follows_parent() {
    let org = Org::new().await;
    let parent = org.channel(ChannelType::Private, &[org.alice, org.bob]).await;
    let thread = thread(&parent, Uuid::new_v4());
    org.store.put_channel(thread.clone()).await;

    org.engine.sync_channel_and_threads(parent.id).await.unwrap();

    let parent_users = org.users_of(parent.id).await;
    let thread_users = org.users_of(thread.id).await;
    assert_eq!(thread_users, parent_users);
    assert!(thread_users.is_subset(&parent_users));
    assert!(!thread_users.contains(&org.carol));
}

#[tokio::test]
async fn test_thread_under_thread_is_empty() {
    let org = Org::new().await;
    let parent = org.channel(ChannelType::Public, &[]).await;
    let outer = thread(&parent, Uuid::new_v4());
    let inner = thread(&outer, Uuid::new_v4());
    org.store.put_channel(outer.clone()).await;
    org.store.put_channel(inner.clone()).await;

    org.engine.sync_channel_and_threads(parent.id).await.unwrap();
    org.engine.sync_channel(inner.id).await.unwrap();

    assert_eq!(org.users_of(outer.id).await.len(), 3);
    assert!(org.users_of(inner.id).await.is_empty());
}

#[tokio::test]
async fn test_user_sync_covers_public_member_and_thread_channels() {
    let org = Org::new().await;
    let public = org.channel(ChannelType::Public, &[]).await;
    let mine = org.channel(ChannelType::Private, &[org.carol]).await;
    let theirs = org.channel(ChannelType::Private, &[org.alice]).await;
    let thread = thread(&mine, Uuid::new_v4());
    org.store.put_channel(thread.clone()).await;

    org.engine
        .sync_user_in_organization(org.carol, org.id)
        .await
        .unwrap();

    assert_eq!(
        org.channels_of(org.carol).await,
        HashSet::from([public.id, mine.id, thread.id])
    );
    assert!(!org.channels_of(org.carol).await.contains(&theirs.id));
}

#[tokio::test]
async fn test_user_leaving_organization_loses_all_rows() {
    let org = Org::new().await;
    let public = org.channel(ChannelType::Public, &[]).await;
    let private = org.channel(ChannelType::Private, &[org.bob]).await;
    org.engine.sync_user_in_organization(org.bob, org.id).await.unwrap();
    assert_eq!(org.channels_of(org.bob).await.len(), 2);

    org.store.remove_organization_member(org.id, org.bob).await;
    let diff = org
        .engine
        .sync_user_in_organization(org.bob, org.id)
        .await
        .unwrap();

    assert_eq!(diff.deleted, 2);
    assert!(org.channels_of(org.bob).await.is_empty());
    assert!(!org.users_of(public.id).await.contains(&org.bob));
    assert!(!org.users_of(private.id).await.contains(&org.bob));
}
