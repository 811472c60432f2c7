//! Bus-to-WebSocket delivery.

use std::sync::Arc;

use axum::extract::ws::Message;
use frontdesk_core::events::ServerEvent;
use frontdesk_events::VenueEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Serializes venue events and hands them to the [`WsManager`].
///
/// Delivery is at-least-once from the terminal's point of view: a terminal
/// that misses frames (lag, reconnect) resynchronizes over HTTP. When the
/// fanout itself lags, every connection is closed so that each terminal
/// reconnects and resyncs.
pub struct EventFanout {
    ws_manager: Arc<WsManager>,
}

impl EventFanout {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the fan-out loop until the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<VenueEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.deliver(&event.event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event fanout lagged, dropping connections");
                    self.ws_manager.shutdown_all().await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, event fanout shutting down");
                    break;
                }
            }
        }
    }

    /// Push one event to every interested connection. Returns the number of
    /// connections reached.
    pub async fn deliver(&self, event: &ServerEvent) -> usize {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, event_type = event.event_type(), "Failed to serialize event");
                return 0;
            }
        };

        let sent = self
            .ws_manager
            .send_event(event.event_type(), event.lane_id(), Message::Text(frame.into()))
            .await;
        tracing::trace!(event_type = event.event_type(), sent, "Event delivered");
        sent
    }
}
