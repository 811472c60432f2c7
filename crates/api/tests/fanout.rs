//! Event fan-out from the bus to WebSocket connections.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use frontdesk_api::fanout::EventFanout;
use frontdesk_api::ws::WsManager;
use frontdesk_core::events::{InventoryPayload, LanePayload, ServerEvent};
use frontdesk_core::lane::SessionPatch;
use frontdesk_events::{EventBus, VenueEvent};

fn lane_event(lane: &str, revision: u64) -> ServerEvent {
    ServerEvent::SelectionAcknowledged(LanePayload {
        lane_id: lane.to_string(),
        revision,
        session: SessionPatch::default(),
    })
}

fn frame_json(msg: Message) -> serde_json::Value {
    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn deliver_writes_type_and_payload_frames() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("a".to_string(), Some("lane-1".to_string())).await;
    let fanout = EventFanout::new(Arc::clone(&manager));

    let sent = fanout.deliver(&lane_event("lane-1", 3)).await;
    assert_eq!(sent, 1);

    let json = frame_json(rx.recv().await.unwrap());
    assert_eq!(json["type"], "SELECTION_ACKNOWLEDGED");
    assert_eq!(json["payload"]["laneId"], "lane-1");
    assert_eq!(json["payload"]["revision"], 3);
}

#[tokio::test]
async fn deliver_respects_lane_scope() {
    let manager = Arc::new(WsManager::new());
    let mut other = manager.add("b".to_string(), Some("lane-2".to_string())).await;
    let fanout = EventFanout::new(Arc::clone(&manager));

    assert_eq!(fanout.deliver(&lane_event("lane-1", 1)).await, 0);
    assert!(other.try_recv().is_err());

    let venue = ServerEvent::InventoryUpdated(InventoryPayload {
        resources: Vec::new(),
    });
    assert_eq!(fanout.deliver(&venue).await, 1);
}

#[tokio::test]
async fn run_forwards_in_order_and_stops_when_the_bus_closes() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("a".to_string(), None).await;
    let bus = EventBus::default();
    let handle = tokio::spawn(EventFanout::new(Arc::clone(&manager)).run(bus.subscribe()));

    for revision in 1..=3 {
        bus.publish(VenueEvent::new(lane_event("lane-1", revision)).with_actor("emp-1"));
    }

    for expected in 1..=3 {
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("frame should arrive")
            .unwrap();
        assert_eq!(frame_json(msg)["payload"]["revision"], expected);
    }

    drop(bus);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("fanout should stop once the bus closes")
        .unwrap();
}

#[tokio::test]
async fn lagging_fanout_closes_every_connection() {
    let manager = Arc::new(WsManager::new());
    let mut rx = manager.add("a".to_string(), Some("lane-1".to_string())).await;
    let bus = EventBus::new(2);
    let receiver = bus.subscribe();

    for revision in 1..=5 {
        bus.publish(VenueEvent::new(lane_event("lane-1", revision)).with_actor("emp-1"));
    }
    let handle = tokio::spawn(EventFanout::new(Arc::clone(&manager)).run(receiver));

    let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("close frame should arrive")
        .unwrap();
    assert!(matches!(first, Message::Close(None)));
    assert_eq!(manager.connection_count().await, 0);

    drop(bus);
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("fanout should stop once the bus closes")
        .unwrap();
}
