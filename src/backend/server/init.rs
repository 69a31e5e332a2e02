/**
 * Server Initialization
 *
 * Wires stores, provider adapters and the pipeline components into an
 * `AppState`, then builds the router.
 *
 * # Initialization Process
 *
 * 1. Load the optional database pool; fall back to the in-memory store
 * 2. Register provider adapters (Discord)
 * 3. Build the Channel-Access engine, the Sync Worker and the dispatcher
 * 4. Create the router
 */

#[cfg(feature = "ssr")]
use axum::Router;
#[cfg(feature = "ssr")]
use std::sync::Arc;

#[cfg(feature = "ssr")]
use crate::backend::channel_access::ChannelAccessEngine;
#[cfg(feature = "ssr")]
use crate::backend::chat_sync::ChatSyncWorker;
#[cfg(feature = "ssr")]
use crate::backend::provider::discord::DiscordAdapter;
#[cfg(feature = "ssr")]
use crate::backend::provider::retry::RetryPolicy;
#[cfg(feature = "ssr")]
use crate::backend::provider::ProviderRegistry;
#[cfg(feature = "ssr")]
use crate::backend::routes::router::create_router;
#[cfg(feature = "ssr")]
use crate::backend::sequencer::ChangeDispatcher;
#[cfg(feature = "ssr")]
use crate::backend::server::config::load_database;
#[cfg(feature = "ssr")]
use crate::backend::server::state::AppState;
#[cfg(feature = "ssr")]
use crate::backend::store::{MemoryStore, PgStore, Stores};
#[cfg(feature = "ssr")]
use crate::shared::config::SyncConfig;

/// Adapters for every supported platform
#[cfg(feature = "ssr")]
pub fn default_providers(config: &SyncConfig) -> ProviderRegistry {
    let retry = RetryPolicy::from(config.retry);
    if config.discord.bot_token.is_none() {
        tracing::warn!("[Discord] DISCORD_BOT_TOKEN not set; bot-authenticated calls will fail");
    }
    ProviderRegistry::new().with(Arc::new(DiscordAdapter::new(&config.discord, retry)))
}

/// Assemble the pipeline components on top of `stores`
#[cfg(feature = "ssr")]
pub fn build_state(config: SyncConfig, stores: Stores, providers: ProviderRegistry) -> AppState {
    let access = Arc::new(ChannelAccessEngine::from_stores(&stores));
    let worker = Arc::new(ChatSyncWorker::new(
        &stores,
        providers,
        access.clone(),
        &config,
    ));
    let dispatcher = Arc::new(ChangeDispatcher::new(worker.clone(), access.clone()));

    AppState {
        config: Arc::new(config),
        worker,
        dispatcher,
        access,
    }
}

/// Create and configure the Axum application
///
/// A missing or unreachable database is not fatal: the server keeps running
/// on the in-memory store.
#[cfg(feature = "ssr")]
pub async fn create_app(config: SyncConfig) -> Router<()> {
    tracing::info!("Initializing chat sync server");

    let stores = match load_database(config.database_url.as_deref()).await {
        Some(pool) => Stores::from_shared(Arc::new(PgStore::new(pool))),
        None => {
            tracing::warn!("[Store] Using in-memory store; state is lost on restart");
            Stores::from_shared(Arc::new(MemoryStore::new()))
        }
    };

    let providers = default_providers(&config);
    tracing::info!("Registered providers: {:?}", providers.providers());

    let app_state = build_state(config, stores, providers);
    create_router(app_state)
}
