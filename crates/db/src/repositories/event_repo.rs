//! Repository for the `lane_events` table.

use frontdesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::event::{LaneEventRow, NewLaneEvent};

const COLUMNS: &str = "id, event_type, lane_id, revision, actor, payload, created_at";

/// Append-only access to the event log.
pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(pool: &PgPool, event: &NewLaneEvent<'_>) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO lane_events (event_type, lane_id, revision, actor, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(event.event_type)
        .bind(event.lane_id)
        .bind(event.revision)
        .bind(event.actor)
        .bind(&event.payload)
        .fetch_one(pool)
        .await
    }

    /// Events for one lane, oldest first.
    pub async fn list_for_lane(
        pool: &PgPool,
        lane_id: &str,
        limit: i64,
    ) -> Result<Vec<LaneEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lane_events WHERE lane_id = $1 ORDER BY revision LIMIT $2"
        );
        sqlx::query_as::<_, LaneEventRow>(&query)
            .bind(lane_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
