use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use frontdesk_core::events::EVENT_TYPES;
use frontdesk_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Lane the terminal belongs to. `None` receives every lane's events
    /// (floor supervisors).
    pub lane_id: Option<String>,
    /// Event types the terminal subscribed to. Empty means every type.
    pub subscriptions: HashSet<String>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

impl WsConnection {
    /// Whether an event of `event_type` should reach this connection.
    /// `event_lane` is `None` for venue-scoped events.
    pub fn wants(&self, event_type: &str, event_lane: Option<&str>) -> bool {
        let lane_ok = match (event_lane, self.lane_id.as_deref()) {
            (Some(event_lane), Some(mine)) => event_lane == mine,
            _ => true,
        };
        lane_ok && (self.subscriptions.is_empty() || self.subscriptions.contains(event_type))
    }
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        lane_id: Option<String>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            lane_id,
            subscriptions: HashSet::new(),
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Replace a connection's subscription set. Unknown event types are
    /// dropped. Returns how many types the connection now receives, or
    /// `None` if the connection is gone.
    pub async fn subscribe(&self, conn_id: &str, events: &[String]) -> Option<usize> {
        let mut conns = self.connections.write().await;
        let conn = conns.get_mut(conn_id)?;

        let (known, unknown): (Vec<&String>, Vec<&String>) = events
            .iter()
            .partition(|e| EVENT_TYPES.contains(&e.as_str()));
        if !unknown.is_empty() {
            tracing::debug!(conn_id, unknown = ?unknown, "Ignoring unknown event types");
        }
        conn.subscriptions = known.into_iter().cloned().collect();
        Some(conn.subscriptions.len())
    }

    /// Deliver an event frame to every connection that wants it.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn send_event(
        &self,
        event_type: &str,
        event_lane: Option<&str>,
        message: Message,
    ) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if conn.wants(event_type, event_lane) && conn.sender.send(message.clone()).is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Connection IDs registered for `lane_id`.
    pub async fn get_by_lane(&self, lane_id: &str) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.lane_id.as_deref() == Some(lane_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
