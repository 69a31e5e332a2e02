//! HTTP surface tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`,
//! backed by the in-memory store and the recording provider.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use hazel_sync::backend::provider::ProviderRegistry;
use hazel_sync::backend::routes::create_router;
use hazel_sync::backend::server::build_state;
use hazel_sync::backend::store::{MemoryStore, Stores};
use hazel_sync::shared::config::SyncConfig;
use hazel_sync::shared::models::{ChannelType, SyncDirection};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::common::*;

const SECRET: &str = "cdc-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    provider: Arc<RecordingProvider>,
}

async fn app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let provider = Arc::new(RecordingProvider::new());
    let config = SyncConfig {
        cdc_webhook_secret: Some(SECRET.to_string()),
        ..test_config()
    };
    let state = build_state(
        config,
        Stores::from_shared(store.clone()),
        ProviderRegistry::new().with(provider.clone()),
    );
    TestApp {
        router: create_router(state),
        store,
        provider,
    }
}

/// Seed one organization member, a connection and a linked public channel
async fn seed(store: &MemoryStore) -> (Uuid, Uuid, Uuid) {
    let organization_id = Uuid::new_v4();
    let connection = connection(organization_id);
    let channel = channel(organization_id, ChannelType::Public);
    let author = user("ada");
    store.put_connection(connection.clone()).await;
    store.put_channel(channel.clone()).await;
    store
        .put_channel_link(channel_link(
            &connection,
            &channel,
            EXTERNAL_CHANNEL_ID,
            SyncDirection::Bidirectional,
        ))
        .await;
    store.put_user(author.clone()).await;
    store.put_organization_member(organization_id, author.id).await;
    (connection.id, channel.id, author.id)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app().await;
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_cdc_webhook_requires_secret() {
    let app = app().await;

    let (status, body) = send(&app.router, post_json("/webhooks/cdc", json!({ "data": [] }))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_cdc_webhook_processes_batch() {
    let app = app().await;
    let (_, channel_id, _) = seed(&app.store).await;
    let mut request = post_json(
        "/webhooks/cdc",
        json!({
            "data": [{
                "record": { "id": channel_id, "type": "public" },
                "metadata": {
                    "table_name": "channels",
                    "commit_timestamp": "2026-05-01T09:00:00Z",
                    "commit_lsn": 42
                },
                "action": "update"
            }]
        }),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", SECRET).parse().unwrap(),
    );

    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total": 1 }));
    assert_eq!(app.store.access_rows().await.len(), 1);
}

#[tokio::test]
async fn test_outbound_message_endpoint() {
    let app = app().await;
    let (connection_id, channel_id, author_id) = seed(&app.store).await;
    let message = message(channel_id, author_id, "over http", 5);
    app.store.put_message(message.clone()).await;

    let uri = format!(
        "/sync/connections/{}/outbound/messages/{}",
        connection_id, message.id
    );
    let (status, body) = send(&app.router, post_json(&uri, json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "synced");
    assert_eq!(body["hazelId"], json!(message.id));
    assert_eq!(body["externalId"], "900000000000000001");
    assert_eq!(app.provider.call_count(), 1);
}

#[tokio::test]
async fn test_outbound_for_unknown_connection_is_404() {
    let app = app().await;
    let uri = format!(
        "/sync/connections/{}/outbound/messages/{}",
        Uuid::new_v4(),
        Uuid::new_v4()
    );

    let (status, _) = send(&app.router, post_json(&uri, json!({}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_inbound_message_endpoint() {
    let app = app().await;
    let (connection_id, _, _) = seed(&app.store).await;

    let uri = format!("/sync/connections/{}/inbound/messages", connection_id);
    let (status, body) = send(
        &app.router,
        post_json(
            &uri,
            json!({
                "externalChannelId": EXTERNAL_CHANNEL_ID,
                "externalMessageId": "300000000000000001",
                "content": "from the gateway",
                "author": { "externalUserId": "4242", "displayName": "Grace" }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "synced");
    assert_eq!(body["externalId"], "300000000000000001");
    assert_eq!(app.store.messages().await.len(), 1);
}

#[tokio::test]
async fn test_inbound_for_unlinked_channel_is_404() {
    let app = app().await;
    let (connection_id, _, _) = seed(&app.store).await;

    let uri = format!("/sync/connections/{}/inbound/messages/delete", connection_id);
    let (status, body) = send(
        &app.router,
        post_json(
            &uri,
            json!({ "externalChannelId": "555", "externalMessageId": "1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_backfill_endpoint_returns_summary() {
    let app = app().await;
    let (connection_id, channel_id, author_id) = seed(&app.store).await;
    app.store
        .put_message(message(channel_id, author_id, "old news", 600))
        .await;

    let uri = format!("/sync/connections/{}/backfill", connection_id);
    let (status, body) = send(&app.router, post_json(&uri, json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "synced": 1, "failed": 0, "skipped": 0 }));
}

#[tokio::test]
async fn test_channel_access_endpoints() {
    let app = app().await;
    let (_, channel_id, author_id) = seed(&app.store).await;
    let organization_id = app.store.channels().await[0].organization_id;

    let (status, body) = send(
        &app.router,
        post_json(&format!("/channel-access/channels/{}/sync", channel_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "inserted": 1, "deleted": 0 }));

    let uri = format!(
        "/channel-access/organizations/{}/users/{}/sync",
        organization_id, author_id
    );
    let (status, body) = send(&app.router, post_json(&uri, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "inserted": 0, "deleted": 0 }));
}
