//! Lane event log rows.

use serde::Serialize;
use sqlx::FromRow;
use frontdesk_core::types::{DbId, Timestamp};

/// A row from the `lane_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneEventRow {
    pub id: DbId,
    pub event_type: String,
    pub lane_id: Option<String>,
    pub revision: Option<i64>,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

/// Insert DTO for `lane_events`.
#[derive(Debug, Clone)]
pub struct NewLaneEvent<'a> {
    pub event_type: &'a str,
    pub lane_id: Option<&'a str>,
    pub revision: Option<i64>,
    pub actor: Option<&'a str>,
    pub payload: serde_json::Value,
}
