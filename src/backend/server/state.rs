/**
 * Application State
 *
 * `AppState` holds the long-lived components every handler needs. The
 * `FromRef` implementations let a handler extract just the component it
 * uses, e.g. `State(worker): State<Arc<ChatSyncWorker>>`.
 */

#[cfg(feature = "ssr")]
use axum::extract::FromRef;
#[cfg(feature = "ssr")]
use std::sync::Arc;

#[cfg(feature = "ssr")]
use crate::backend::channel_access::ChannelAccessEngine;
#[cfg(feature = "ssr")]
use crate::backend::chat_sync::ChatSyncWorker;
#[cfg(feature = "ssr")]
use crate::backend::sequencer::ChangeDispatcher;
#[cfg(feature = "ssr")]
use crate::shared::config::SyncConfig;

/// Shared state of the sync server
#[cfg(feature = "ssr")]
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,

    /// Outbound / inbound sync operations
    pub worker: Arc<ChatSyncWorker>,

    /// Change-capture batch handling
    pub dispatcher: Arc<ChangeDispatcher>,

    /// Channel visibility recomputation
    pub access: Arc<ChannelAccessEngine>,
}

#[cfg(feature = "ssr")]
impl FromRef<AppState> for Arc<SyncConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

#[cfg(feature = "ssr")]
impl FromRef<AppState> for Arc<ChatSyncWorker> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.worker.clone()
    }
}

#[cfg(feature = "ssr")]
impl FromRef<AppState> for Arc<ChangeDispatcher> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.dispatcher.clone()
    }
}

#[cfg(feature = "ssr")]
impl FromRef<AppState> for Arc<ChannelAccessEngine> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.access.clone()
    }
}
