//! Provider Adapters
//!
//! # Module Structure
//!
//! ```text
//! provider/
//! ├── mod.rs      - ChatProviderAdapter trait, request types, ProviderRegistry
//! ├── retry.rs    - Capped exponential backoff with jitter
//! └── discord.rs  - Discord REST implementation
//! ```
//!
//! An adapter turns abstract sync operations into platform API calls. It
//! validates input first and fails with `ProviderError::Configuration`
//! without touching the network when the input cannot be valid.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::error::{ProviderError, SyncError};
use crate::shared::models::WebhookIdentity;

pub mod discord;
pub mod retry;

pub use discord::DiscordAdapter;
pub use retry::RetryPolicy;

/// Post through a webhook instead of the bot account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookDelivery {
    pub identity: WebhookIdentity,
    /// Display name shown on the mirrored message
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    /// Target thread when the channel link points at an external thread
    pub thread_id: Option<String>,
}

/// Message to create on the external platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub content: String,
    pub reply_to_message_id: Option<String>,
    pub webhook: Option<WebhookDelivery>,
}

impl OutboundMessage {
    pub fn new(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            content: content.into(),
            reply_to_message_id: None,
            webhook: None,
        }
    }
}

/// Capability set every platform adapter implements
#[async_trait]
pub trait ChatProviderAdapter: Send + Sync {
    /// Registry name, e.g. `discord`
    fn provider(&self) -> &str;

    /// Returns the external message id
    async fn create_message(&self, message: &OutboundMessage) -> Result<String, ProviderError>;

    async fn update_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
        webhook: Option<&WebhookDelivery>,
    ) -> Result<(), ProviderError>;

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
        webhook: Option<&WebhookDelivery>,
    ) -> Result<(), ProviderError>;

    async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ProviderError>;

    async fn remove_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ProviderError>;

    /// Returns the external thread id
    async fn create_thread(
        &self,
        channel_id: &str,
        root_message_id: &str,
        name: &str,
    ) -> Result<String, ProviderError>;
}

/// Adapter lookup by provider name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ChatProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn ChatProviderAdapter>) {
        self.adapters.insert(adapter.provider().to_string(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn ChatProviderAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, provider: &str) -> Result<Arc<dyn ChatProviderAdapter>, SyncError> {
        self.adapters
            .get(provider)
            .cloned()
            .ok_or_else(|| SyncError::provider_not_supported(provider))
    }

    /// Registered provider names, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}
