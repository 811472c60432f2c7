use axum::extract::{Path, State};
use axum::Json;
use frontdesk_core::inventory::{InventorySnapshot, Resource};
use frontdesk_core::rental::{ResourceRef, ResourceStatus, ResourceType};
use frontdesk_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: ResourceStatus,
}

/// GET /inventory/detailed
pub async fn detailed(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<InventorySnapshot>>> {
    let snapshot = state.coordinator.inventory().await;
    Ok(Json(DataResponse { data: snapshot }))
}

/// PATCH /inventory/{resource_type}/{id}/status
///
/// Housekeeping moves between CLEAN, DIRTY and CLEANING. Occupancy is
/// only ever changed by check-in and checkout.
pub async fn set_status(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path((resource_type, id)): Path<(ResourceType, DbId)>,
    Json(input): Json<SetStatusRequest>,
) -> AppResult<Json<DataResponse<Resource>>> {
    let target = ResourceRef {
        resource_type,
        resource_id: id,
    };
    let resource = state
        .coordinator
        .set_resource_status(target, input.status, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: resource }))
}
