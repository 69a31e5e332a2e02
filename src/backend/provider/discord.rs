/**
 * Discord Adapter
 *
 * Implements `ChatProviderAdapter` over the Discord REST API (v10).
 *
 * # Endpoints
 *
 * - create:   `POST /channels/{channel}/messages`
 * - update:   `PATCH /channels/{channel}/messages/{message}`
 * - delete:   `DELETE /channels/{channel}/messages/{message}`
 * - reaction: `PUT|DELETE /channels/{channel}/messages/{message}/reactions/{emoji}/@me`
 * - thread:   `POST /channels/{channel}/messages/{message}/threads`
 * - webhook:  `POST|PATCH|DELETE /webhooks/{id}/{token}[/messages/{message}]`
 *
 * Bot calls authenticate with `Authorization: Bot <token>`; webhook calls
 * carry their credentials in the URL.
 *
 * # Validation
 *
 * Ids must be snowflakes (17-20 digits), content at most 2000 characters,
 * emoji non-empty, thread names non-empty (truncated to 100 characters).
 * Invalid input fails with `ProviderError::Configuration` and no request.
 */

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};

use async_trait::async_trait;

use crate::backend::error::ProviderError;
use crate::backend::provider::{
    ChatProviderAdapter, OutboundMessage, RetryPolicy, WebhookDelivery,
};
use crate::shared::config::DiscordConfig;

pub const PROVIDER_NAME: &str = "discord";

pub const MAX_CONTENT_LENGTH: usize = 2000;
pub const MAX_THREAD_NAME_LENGTH: usize = 100;
const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Bot,
    /// Credentials are part of the URL
    Webhook,
}

/// Check that `value` looks like a Discord snowflake id
pub fn validate_snowflake(field: &str, value: &str) -> Result<(), ProviderError> {
    let valid = (17..=20).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ProviderError::configuration(format!(
            "{} must be a Discord snowflake, got '{}'",
            field, value
        )))
    }
}

pub fn validate_content(content: &str) -> Result<(), ProviderError> {
    let length = content.chars().count();
    if length > MAX_CONTENT_LENGTH {
        return Err(ProviderError::configuration(format!(
            "message content is {} characters, Discord allows at most {}",
            length, MAX_CONTENT_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_emoji(emoji: &str) -> Result<(), ProviderError> {
    if emoji.trim().is_empty() {
        return Err(ProviderError::configuration("emoji must not be empty"));
    }
    Ok(())
}

/// Trimmed and truncated thread name
pub fn normalize_thread_name(name: &str) -> Result<String, ProviderError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProviderError::configuration("thread name must not be empty"));
    }
    Ok(trimmed.chars().take(MAX_THREAD_NAME_LENGTH).collect())
}

fn validate_webhook(webhook: &WebhookDelivery) -> Result<(), ProviderError> {
    validate_snowflake("webhook id", &webhook.identity.webhook_id)?;
    if webhook.identity.webhook_token.trim().is_empty() {
        return Err(ProviderError::configuration("webhook token must not be empty"));
    }
    if let Some(thread_id) = &webhook.thread_id {
        validate_snowflake("thread id", thread_id)?;
    }
    Ok(())
}

fn response_id(status: StatusCode, body: Option<Value>) -> Result<String, ProviderError> {
    body.as_ref()
        .and_then(|value| value.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::api(status.as_u16(), "response did not include an id"))
}

/// Discord REST client
#[derive(Debug, Clone)]
pub struct DiscordAdapter {
    client: reqwest::Client,
    api_base_url: String,
    bot_token: Option<String>,
    retry: RetryPolicy,
}

impl DiscordAdapter {
    pub fn new(config: &DiscordConfig, retry: RetryPolicy) -> Self {
        Self::with_client(reqwest::Client::new(), config, retry)
    }

    pub fn with_client(client: reqwest::Client, config: &DiscordConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            api_base_url: config.api_base_url.clone(),
            bot_token: config.bot_token.clone().filter(|token| !token.trim().is_empty()),
            retry,
        }
    }

    fn require_bot_token(&self) -> Result<&str, ProviderError> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| ProviderError::configuration("Discord bot token is not configured"))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api_base_url).map_err(|e| {
            ProviderError::configuration(format!("invalid Discord API base URL: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::configuration("Discord API base URL cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn webhook_endpoint(
        &self,
        webhook: &WebhookDelivery,
        message_id: Option<&str>,
    ) -> Result<Url, ProviderError> {
        let identity = &webhook.identity;
        let mut segments = vec![
            "webhooks",
            identity.webhook_id.as_str(),
            identity.webhook_token.as_str(),
        ];
        if let Some(message_id) = message_id {
            segments.extend(["messages", message_id]);
        }
        let mut url = self.endpoint(&segments)?;
        {
            let mut query = url.query_pairs_mut();
            if message_id.is_none() {
                query.append_pair("wait", "true");
            }
            if let Some(thread_id) = &webhook.thread_id {
                query.append_pair("thread_id", thread_id);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<(StatusCode, Option<Value>), ProviderError> {
        let mut request = self.client.request(method, url);
        if auth == Auth::Bot {
            request = request.header(AUTHORIZATION, format!("Bot {}", self.require_bot_token()?));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok((status, None));
            }
            let value = serde_json::from_str(&text).map_err(|e| {
                ProviderError::api(status.as_u16(), format!("invalid response body: {}", e))
            })?;
            return Ok((status, Some(value)));
        }

        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
            .or_else(|| (!text.is_empty()).then(|| text.clone()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        Err(ProviderError::api(status.as_u16(), message))
    }

    async fn call(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<Value>,
        auth: Auth,
    ) -> Result<(StatusCode, Option<Value>), ProviderError> {
        let body = body.as_ref();
        let result = self
            .retry
            .run(operation, || self.send(method.clone(), url.clone(), body, auth))
            .await;
        match &result {
            Ok((status, _)) => tracing::debug!("[Discord] {} -> {}", operation, status),
            Err(err) => tracing::warn!("[Discord] {} failed: {}", operation, err),
        }
        result
    }
}

#[async_trait]
impl ChatProviderAdapter for DiscordAdapter {
    fn provider(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_message(&self, message: &OutboundMessage) -> Result<String, ProviderError> {
        validate_snowflake("channel id", &message.channel_id)?;
        validate_content(&message.content)?;
        if let Some(reply_to) = &message.reply_to_message_id {
            validate_snowflake("reply message id", reply_to)?;
        }

        if let Some(webhook) = &message.webhook {
            validate_webhook(webhook)?;
            // Webhook executions cannot carry a message reference
            let mut body = json!({
                "content": message.content,
                "allowed_mentions": { "parse": [] },
            });
            if let Some(username) = &webhook.username {
                body["username"] = json!(username);
            }
            if let Some(avatar_url) = &webhook.avatar_url {
                body["avatar_url"] = json!(avatar_url);
            }
            let url = self.webhook_endpoint(webhook, None)?;
            let (status, response) = self
                .call("create_message", Method::POST, url, Some(body), Auth::Webhook)
                .await?;
            return response_id(status, response);
        }

        self.require_bot_token()?;
        let mut body = json!({
            "content": message.content,
            "allowed_mentions": { "parse": [] },
        });
        if let Some(reply_to) = &message.reply_to_message_id {
            body["message_reference"] = json!({
                "message_id": reply_to,
                "fail_if_not_exists": false,
            });
        }
        let url = self.endpoint(&["channels", &message.channel_id, "messages"])?;
        let (status, response) = self
            .call("create_message", Method::POST, url, Some(body), Auth::Bot)
            .await?;
        response_id(status, response)
    }

    async fn update_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        webhook: Option<&WebhookDelivery>,
    ) -> Result<(), ProviderError> {
        validate_snowflake("channel id", channel_id)?;
        validate_snowflake("message id", message_id)?;
        validate_content(content)?;
        let body = json!({ "content": content, "allowed_mentions": { "parse": [] } });

        let (url, auth) = match webhook {
            Some(webhook) => {
                validate_webhook(webhook)?;
                (self.webhook_endpoint(webhook, Some(message_id))?, Auth::Webhook)
            }
            None => {
                self.require_bot_token()?;
                (
                    self.endpoint(&["channels", channel_id, "messages", message_id])?,
                    Auth::Bot,
                )
            }
        };
        self.call("update_message", Method::PATCH, url, Some(body), auth)
            .await
            .map(|_| ())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        webhook: Option<&WebhookDelivery>,
    ) -> Result<(), ProviderError> {
        validate_snowflake("channel id", channel_id)?;
        validate_snowflake("message id", message_id)?;

        let (url, auth) = match webhook {
            Some(webhook) => {
                validate_webhook(webhook)?;
                (self.webhook_endpoint(webhook, Some(message_id))?, Auth::Webhook)
            }
            None => {
                self.require_bot_token()?;
                (
                    self.endpoint(&["channels", channel_id, "messages", message_id])?,
                    Auth::Bot,
                )
            }
        };
        self.call("delete_message", Method::DELETE, url, None, auth)
            .await
            .map(|_| ())
    }

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ProviderError> {
        validate_snowflake("channel id", channel_id)?;
        validate_snowflake("message id", message_id)?;
        validate_emoji(emoji)?;
        self.require_bot_token()?;

        let url = self.endpoint(&[
            "channels", channel_id, "messages", message_id, "reactions", emoji, "@me",
        ])?;
        self.call("add_reaction", Method::PUT, url, None, Auth::Bot)
            .await
            .map(|_| ())
    }

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ProviderError> {
        validate_snowflake("channel id", channel_id)?;
        validate_snowflake("message id", message_id)?;
        validate_emoji(emoji)?;
        self.require_bot_token()?;

        let url = self.endpoint(&[
            "channels", channel_id, "messages", message_id, "reactions", emoji, "@me",
        ])?;
        self.call("remove_reaction", Method::DELETE, url, None, Auth::Bot)
            .await
            .map(|_| ())
    }

    async fn create_thread(
        &self,
        channel_id: &str,
        root_message_id: &str,
        name: &str,
    ) -> Result<String, ProviderError> {
        validate_snowflake("channel id", channel_id)?;
        validate_snowflake("root message id", root_message_id)?;
        let name = normalize_thread_name(name)?;
        self.require_bot_token()?;

        let url = self.endpoint(&["channels", channel_id, "messages", root_message_id, "threads"])?;
        let body = json!({
            "name": name,
            "auto_archive_duration": THREAD_AUTO_ARCHIVE_MINUTES,
        });
        let (status, response) = self
            .call("create_thread", Method::POST, url, Some(body), Auth::Bot)
            .await?;
        response_id(status, response)
    }
}
