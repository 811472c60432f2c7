//! Lane WebSocket frames.
//!
//! The server sends `{"type": "<EVENT_TYPE>", "payload": {...}}` frames that
//! decode into [`ServerEvent`]. Frames with a type this build does not know
//! are skipped, so a newer server can add events without breaking older
//! terminals.

use frontdesk_core::events::{ServerEvent, EVENT_TYPES};
use serde::{Deserialize, Serialize};

/// Messages a terminal sends after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { events: Vec<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame has no type")]
    MissingType,
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type", borrow)]
    event_type: Option<&'a str>,
}

/// Parse one text frame.
///
/// Returns `Ok(None)` for a well-formed frame of an unknown type. A known
/// type with a payload that does not match is an error.
pub fn parse_frame(text: &str) -> Result<Option<ServerEvent>, FrameError> {
    let envelope: Envelope<'_> = serde_json::from_str(text)?;
    let event_type = envelope.event_type.ok_or(FrameError::MissingType)?;

    if !EVENT_TYPES.contains(&event_type) {
        tracing::debug!(event_type, "Skipping unknown event type");
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_session_updated() {
        let json = r#"{"type":"SESSION_UPDATED","payload":{"laneId":"lane-1","revision":3,"session":{"customerName":"Alex Rivera"}}}"#;
        let event = parse_frame(json).unwrap().unwrap();
        assert_matches!(event, ServerEvent::SessionUpdated(p) => {
            assert_eq!(p.lane_id, "lane-1");
            assert_eq!(p.revision, 3);
            assert_eq!(p.session.customer_name.as_deref(), Some("Alex Rivera"));
        });
    }

    #[test]
    fn parse_assignment_failed() {
        let json = r#"{"type":"ASSIGNMENT_FAILED","payload":{"laneId":"lane-2","revision":7,"contested":{"resourceType":"room","resourceId":1},"code":"RACE_LOST","raceLost":true,"suggestedResource":{"resourceType":"room","resourceId":2,"number":"102","tier":"STANDARD"}}}"#;
        let event = parse_frame(json).unwrap().unwrap();
        assert_matches!(event, ServerEvent::AssignmentFailed(p) => {
            assert!(p.race_lost);
            assert_eq!(p.suggested_resource.unwrap().number, "102");
        });
    }

    #[test]
    fn unknown_type_is_skipped() {
        let json = r#"{"type":"LOYALTY_POINTS_AWARDED","payload":{"points":10}}"#;
        assert!(parse_frame(json).unwrap().is_none());
    }

    #[test]
    fn known_type_with_bad_payload_is_an_error() {
        let json = r#"{"type":"SESSION_UPDATED","payload":{"revision":"three"}}"#;
        assert_matches!(parse_frame(json), Err(FrameError::Json(_)));
    }

    #[test]
    fn missing_type_is_an_error() {
        assert_matches!(parse_frame(r#"{"payload":{}}"#), Err(FrameError::MissingType));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert_matches!(parse_frame("not json at all"), Err(FrameError::Json(_)));
    }

    #[test]
    fn subscribe_message_shape() {
        let msg = ClientMessage::Subscribe {
            events: vec!["SESSION_UPDATED".into()],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["events"][0], "SESSION_UPDATED");
    }
}
