//! Venue-wide waitlist handlers. Joining happens through a lane, see
//! [`lane::join_waitlist`](super::lane::join_waitlist).

use axum::extract::{Path, State};
use axum::Json;
use frontdesk_core::customer::Visit;
use frontdesk_core::rental::{ResourceRef, ResourceType};
use frontdesk_core::types::DbId;
use frontdesk_core::waitlist::WaitlistEntry;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRequest {
    pub resource_type: ResourceType,
    pub resource_id: DbId,
}

/// GET /waitlist
pub async fn list(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<WaitlistEntry>>>> {
    let entries = state.coordinator.waitlist().await;
    Ok(Json(DataResponse { data: entries }))
}

/// POST /waitlist/{id}/offer
pub async fn offer(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<OfferRequest>,
) -> AppResult<Json<DataResponse<WaitlistEntry>>> {
    let target = ResourceRef {
        resource_type: input.resource_type,
        resource_id: input.resource_id,
    };
    let entry = state
        .coordinator
        .offer_waitlist(&id, target, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: entry }))
}

/// POST /waitlist/{id}/fulfill
pub async fn fulfill(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Visit>>> {
    let visit = state.coordinator.fulfill_waitlist(&id, &user.user_id).await?;
    Ok(Json(DataResponse { data: visit }))
}

/// POST /waitlist/{id}/cancel
pub async fn cancel(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<WaitlistEntry>>> {
    let entry = state.coordinator.cancel_waitlist(&id, &user.user_id).await?;
    Ok(Json(DataResponse { data: entry }))
}
