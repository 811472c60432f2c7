//! WebSocket frame processing loop.
//!
//! Reads frames from a lane connection, parses them with [`parse_frame`]
//! and folds each event into the shared [`TerminalState`] through the pure
//! reducer. Watchers are only woken when the projection actually changed.

use frontdesk_core::events::ServerEvent;
use frontdesk_core::projection::{reduce, TerminalState};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::LaneStream;
use crate::messages::parse_frame;

/// Why [`process_frames`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// The server closed the socket or the stream ran out.
    Closed,
    /// A receive error dropped the connection.
    Failed(String),
    /// Frames were lost; the connection is still open but the projection
    /// must be refetched before it can be trusted.
    ResyncNeeded,
    Cancelled,
}

/// Fold one event into the shared state. Returns whether it changed.
pub fn apply_event(state: &watch::Sender<TerminalState>, event: &ServerEvent) -> bool {
    state.send_if_modified(|current| {
        let next = reduce(current.clone(), event);
        if next == *current {
            return false;
        }
        *current = next;
        true
    })
}

/// Parse and fold one text frame. Returns whether the state changed.
pub fn handle_text_frame(state: &watch::Sender<TerminalState>, lane_id: &str, text: &str) -> bool {
    match parse_frame(text) {
        Ok(Some(event)) => {
            let changed = apply_event(state, &event);
            tracing::trace!(lane_id, event_type = event.event_type(), changed, "Event applied");
            changed
        }
        Ok(None) => false,
        Err(e) => {
            tracing::warn!(
                lane_id,
                error = %e,
                raw_message = %text,
                "Failed to parse lane frame",
            );
            false
        }
    }
}

/// Process frames until the socket closes or fails, a revision gap is seen,
/// or `cancel` fires.
pub async fn process_frames(
    ws_stream: &mut LaneStream,
    lane_id: &str,
    state: &watch::Sender<TerminalState>,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            next = ws_stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                if handle_text_frame(state, lane_id, &text) && state.borrow().needs_resync {
                    tracing::info!(lane_id, "Lane revision gap detected");
                    return StreamEnd::ResyncNeeded;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::trace!(lane_id, "Ignoring binary frame");
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(lane_id, ?frame, "Lane event stream closed");
                return StreamEnd::Closed;
            }
            Some(Ok(Message::Frame(_))) => {}
            Some(Err(e)) => {
                tracing::error!(lane_id, error = %e, "WebSocket receive error");
                return StreamEnd::Failed(e.to_string());
            }
            None => return StreamEnd::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use frontdesk_core::lane::SessionPatch;

    use super::*;

    fn session_frame(revision: u64, name: &str) -> String {
        serde_json::json!({
            "type": "SESSION_UPDATED",
            "payload": {
                "laneId": "lane-1",
                "revision": revision,
                "session": { "customerName": name, "status": "ACTIVE" }
            }
        })
        .to_string()
    }

    #[test]
    fn frame_updates_watchers() {
        let (tx, mut rx) = watch::channel(TerminalState::new("lane-1", None));
        rx.mark_unchanged();

        assert!(handle_text_frame(&tx, "lane-1", &session_frame(1, "Alex")));
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.last_revision, 1);
        assert_eq!(
            state.session.and_then(|s| s.customer_name).as_deref(),
            Some("Alex")
        );
    }

    #[test]
    fn redelivered_frame_does_not_wake_watchers() {
        let (tx, mut rx) = watch::channel(TerminalState::new("lane-1", None));
        handle_text_frame(&tx, "lane-1", &session_frame(1, "Alex"));
        rx.mark_unchanged();

        assert!(!handle_text_frame(&tx, "lane-1", &session_frame(1, "Alex")));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn skipped_revision_flags_the_state() {
        let (tx, rx) = watch::channel(TerminalState::new("lane-1", None));
        handle_text_frame(&tx, "lane-1", &session_frame(1, "Alex"));
        assert!(!rx.borrow().needs_resync);

        assert!(handle_text_frame(&tx, "lane-1", &session_frame(3, "Alex")));
        assert!(rx.borrow().needs_resync);
    }

    #[test]
    fn unknown_and_malformed_frames_are_no_ops() {
        let (tx, rx) = watch::channel(TerminalState::new("lane-1", None));
        let before = rx.borrow().clone();

        assert!(!handle_text_frame(&tx, "lane-1", r#"{"type":"SOMETHING_NEW","payload":{}}"#));
        assert!(!handle_text_frame(&tx, "lane-1", "{broken"));
        assert_eq!(*rx.borrow(), before);
    }

    #[test]
    fn completion_frame_bumps_clear_epoch() {
        let (tx, rx) = watch::channel(TerminalState::new("lane-1", None));
        handle_text_frame(&tx, "lane-1", &session_frame(1, "Alex"));

        let completion = ServerEvent::SessionUpdated(frontdesk_core::events::LanePayload {
            lane_id: "lane-1".into(),
            revision: 2,
            session: SessionPatch::completion(),
        });
        assert!(apply_event(&tx, &completion));

        let state = rx.borrow();
        assert!(state.session.is_none());
        assert_eq!(state.clear_epoch, 1);
    }
}
