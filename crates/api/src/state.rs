use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::Coordinator;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, when `DATABASE_URL` is configured.
    pub pool: Option<frontdesk_db::DbPool>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (terminals).
    pub ws_manager: Arc<WsManager>,
    /// Centralized event bus that every venue change is published on.
    pub event_bus: Arc<frontdesk_events::EventBus>,
    /// Authoritative lane, inventory and checkout state.
    pub coordinator: Arc<Coordinator>,
}
