//! WebSocket client for a lane's event stream.
//!
//! [`LaneClient`] holds the connection configuration for one terminal.
//! [`LaneClient::connect`] opens `/api/v1/ws?lane=...` and, when the
//! terminal only cares about some event types, sends the subscribe message.

use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::messages::ClientMessage;

pub type LaneStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for one terminal's event subscription.
#[derive(Debug, Clone)]
pub struct LaneClient {
    lane_id: String,
    /// WebSocket base URL including the version prefix, e.g. `ws://host:3000/api/v1`.
    ws_url: String,
    /// Event types to receive; empty receives every type.
    subscriptions: Vec<String>,
}

/// A live event stream for one lane.
pub struct LaneConnection {
    pub lane_id: String,
    /// Local id used to correlate log lines for this connection.
    pub connection_id: String,
    pub ws_stream: LaneStream,
}

impl LaneClient {
    pub fn new(lane_id: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            lane_id: lane_id.into(),
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            subscriptions: Vec::new(),
        }
    }

    /// Restrict delivery to the given event types.
    pub fn with_subscriptions<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscriptions = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn lane_id(&self) -> &str {
        &self.lane_id
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Full endpoint URL for this lane.
    pub fn endpoint(&self) -> String {
        format!("{}/ws?lane={}", self.ws_url, self.lane_id)
    }

    pub async fn connect(&self) -> Result<LaneConnection, LaneClientError> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let url = self.endpoint();

        let (mut ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            LaneClientError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        if !self.subscriptions.is_empty() {
            let subscribe = ClientMessage::Subscribe {
                events: self.subscriptions.clone(),
            };
            let text = serde_json::to_string(&subscribe)
                .map_err(|e| LaneClientError::Protocol(e.to_string()))?;
            ws_stream
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| LaneClientError::Protocol(format!("Failed to subscribe: {e}")))?;
        }

        tracing::info!(
            lane_id = %self.lane_id,
            connection_id = %connection_id,
            subscriptions = self.subscriptions.len(),
            "Connected to lane event stream",
        );

        Ok(LaneConnection {
            lane_id: self.lane_id.clone(),
            connection_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum LaneClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an already-established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_scopes_to_lane() {
        let client = LaneClient::new("lane-1", "ws://localhost:3000/api/v1/");
        assert_eq!(client.endpoint(), "ws://localhost:3000/api/v1/ws?lane=lane-1");
    }

    #[test]
    fn subscriptions_default_to_everything() {
        let client = LaneClient::new("lane-1", "ws://localhost:3000/api/v1");
        assert!(client.subscriptions.is_empty());

        let client = client.with_subscriptions(["SESSION_UPDATED", "ASSIGNMENT_FAILED"]);
        assert_eq!(client.subscriptions.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let client = LaneClient::new("lane-1", "ws://127.0.0.1:1/api/v1");
        let err = client.connect().await.err().unwrap();
        assert!(matches!(err, LaneClientError::Connection(_)));
    }
}
