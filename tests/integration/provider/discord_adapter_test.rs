//! Discord adapter tests against a mock HTTP server
//!
//! Uses wiremock to stand in for the Discord REST API.

use assert_matches::assert_matches;
use hazel_sync::backend::error::ProviderError;
use hazel_sync::backend::provider::{
    ChatProviderAdapter, DiscordAdapter, OutboundMessage, RetryPolicy, WebhookDelivery,
};
use hazel_sync::shared::config::DiscordConfig;
use hazel_sync::shared::models::WebhookIdentity;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHANNEL: &str = "100000000000000001";
const MESSAGE: &str = "200000000000000002";

async fn setup(attempts: u32) -> (MockServer, DiscordAdapter) {
    let server = MockServer::start().await;
    let config = DiscordConfig {
        bot_token: Some("test-bot-token".to_string()),
        api_base_url: format!("{}/api/v10", server.uri()),
    };
    let adapter = DiscordAdapter::new(&config, RetryPolicy::immediate(attempts));
    (server, adapter)
}

#[tokio::test]
async fn test_create_message_as_bot() {
    let (server, adapter) = setup(1).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/v10/channels/{}/messages", CHANNEL)))
        .and(header("authorization", "Bot test-bot-token"))
        .and(body_partial_json(json!({
            "content": "hello",
            "message_reference": { "message_id": MESSAGE }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "300000000000000003" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut message = OutboundMessage::new(CHANNEL, "hello");
    message.reply_to_message_id = Some(MESSAGE.to_string());
    let id = adapter.create_message(&message).await.unwrap();

    assert_eq!(id, "300000000000000003");
}

#[tokio::test]
async fn test_create_message_via_webhook_waits_for_id() {
    let (server, adapter) = setup(1).await;
    Mock::given(method("POST"))
        .and(path("/api/v10/webhooks/700000000000000007/secret"))
        .and(query_param("wait", "true"))
        .and(body_partial_json(json!({ "username": "Ada", "content": "hi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "300000000000000004" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut message = OutboundMessage::new(CHANNEL, "hi");
    message.webhook = Some(WebhookDelivery {
        identity: WebhookIdentity {
            webhook_id: "700000000000000007".to_string(),
            webhook_token: "secret".to_string(),
        },
        username: Some("Ada".to_string()),
        avatar_url: None,
        thread_id: None,
    });

    assert_eq!(
        adapter.create_message(&message).await.unwrap(),
        "300000000000000004"
    );
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (server, adapter) = setup(3).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/api/v10/channels/{}/messages/{}/reactions/%F0%9F%91%8D/@me",
            CHANNEL, MESSAGE
        )))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter.add_reaction(CHANNEL, MESSAGE, "👍").await.unwrap();
}

#[tokio::test]
async fn test_rate_limit_is_retried_until_budget_is_spent() {
    let (server, adapter) = setup(2).await;
    Mock::given(method("DELETE"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({ "message": "You are being rate limited." })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let err = adapter
        .delete_message(CHANNEL, MESSAGE, None)
        .await
        .unwrap_err();

    assert_matches!(err, ProviderError::Api { status: 429, ref message } if message.contains("rate limited"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (server, adapter) = setup(5).await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Unknown Message" })))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter
        .update_message(CHANNEL, MESSAGE, "edit", None)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_the_api() {
    let (server, adapter) = setup(3).await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let bad_channel = adapter
        .create_message(&OutboundMessage::new("general", "hi"))
        .await
        .unwrap_err();
    assert_matches!(bad_channel, ProviderError::Configuration { .. });

    let too_long = adapter
        .create_message(&OutboundMessage::new(CHANNEL, "x".repeat(2001)))
        .await
        .unwrap_err();
    assert_matches!(too_long, ProviderError::Configuration { .. });

    let no_emoji = adapter.remove_reaction(CHANNEL, MESSAGE, " ").await.unwrap_err();
    assert_matches!(no_emoji, ProviderError::Configuration { .. });

    let no_name = adapter.create_thread(CHANNEL, MESSAGE, "").await.unwrap_err();
    assert_matches!(no_name, ProviderError::Configuration { .. });
}

#[tokio::test]
async fn test_create_thread_from_message() {
    let (server, adapter) = setup(1).await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/api/v10/channels/{}/messages/{}/threads",
            CHANNEL, MESSAGE
        )))
        .and(body_partial_json(json!({ "name": "Launch", "auto_archive_duration": 1440 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": MESSAGE })))
        .expect(1)
        .mount(&server)
        .await;

    let thread_id = adapter.create_thread(CHANNEL, MESSAGE, "  Launch  ").await.unwrap();

    assert_eq!(thread_id, MESSAGE);
}

#[tokio::test]
async fn test_success_without_id_is_an_api_error() {
    let (server, adapter) = setup(1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = adapter
        .create_message(&OutboundMessage::new(CHANNEL, "hi"))
        .await
        .unwrap_err();

    assert_matches!(err, ProviderError::Api { status: 200, .. });
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error() {
    let config = DiscordConfig {
        bot_token: Some("token".to_string()),
        api_base_url: "http://127.0.0.1:9/api/v10".to_string(),
    };
    let adapter = DiscordAdapter::new(&config, RetryPolicy::immediate(1));

    let err = adapter
        .delete_message(CHANNEL, MESSAGE, None)
        .await
        .unwrap_err();

    assert_matches!(err, ProviderError::Transport { .. });
    assert!(err.is_retryable());
}
