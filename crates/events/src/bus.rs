//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the central publish/subscribe hub for [`VenueEvent`]s.
//! It is shared via `Arc<EventBus>` across the server: the coordinator
//! publishes, the WebSocket fanout, persistence and write-back subscribe.

use chrono::{DateTime, Utc};
use frontdesk_core::events::ServerEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// VenueEvent
// ---------------------------------------------------------------------------

/// A [`ServerEvent`] plus server-side metadata that never reaches terminals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueEvent {
    pub event: ServerEvent,

    /// JWT subject of the caller whose command produced the event.
    pub actor: Option<String>,

    /// When the event was published (UTC).
    pub timestamp: DateTime<Utc>,
}

impl VenueEvent {
    pub fn new(event: ServerEvent) -> Self {
        Self {
            event,
            actor: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the acting user to the event.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`VenueEvent`], in publish order.
pub struct EventBus {
    sender: broadcast::Sender<VenueEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: VenueEvent) {
        tracing::debug!(
            event_type = event.event_type(),
            lane_id = event.event.lane_id(),
            "Publishing event"
        );
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<VenueEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
