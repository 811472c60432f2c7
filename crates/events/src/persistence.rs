//! Durable event log.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every received [`VenueEvent`] to `lane_events`. It runs as a
//! long-lived background task and exits when the bus sender is dropped.
//! Failures are logged and skipped; the log is best-effort.

use frontdesk_db::models::event::NewLaneEvent;
use frontdesk_db::repositories::EventRepo;
use frontdesk_db::DbPool;
use frontdesk_core::types::DbId;
use tokio::sync::broadcast;

use crate::bus::VenueEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<VenueEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = event.event_type(),
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &VenueEvent) -> Result<DbId, sqlx::Error> {
        let payload = serde_json::to_value(&event.event)
            .map_err(|e| sqlx::Error::Protocol(format!("event serialization: {e}")))?;
        let lane = event.event.lane();

        EventRepo::insert(
            pool,
            &NewLaneEvent {
                event_type: event.event_type(),
                lane_id: lane.map(|l| l.lane_id.as_str()),
                revision: lane.and_then(|l| i64::try_from(l.revision).ok()),
                actor: event.actor.as_deref(),
                payload,
            },
        )
        .await
    }
}
