//! Handlers for the checkout flow: resolve, request, claim, confirm items,
//! settle the late fee and complete.

use axum::extract::{Path, Query, State};
use axum::Json;
use frontdesk_core::checkout::{CheckoutContext, CheckoutView};
use frontdesk_core::events::CheckoutCompletedPayload;
use frontdesk_core::rental::ResourceType;
use serde::Deserialize;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::rbac::{RequireAuth, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

/// Identifies an occupied resource by its printed number, as scanned from
/// a key tag.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNumberParams {
    pub resource_type: ResourceType,
    #[validate(length(min = 1, max = 32))]
    pub number: String,
}

/// GET /checkout/resolve?resourceType=room&number=101
pub async fn resolve(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<ResourceNumberParams>,
) -> AppResult<Json<DataResponse<CheckoutContext>>> {
    params.validate()?;
    let context = state
        .coordinator
        .resolve_checkout(params.resource_type, &params.number)
        .await?;
    Ok(Json(DataResponse { data: context }))
}

/// POST /checkout/request
pub async fn request(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<ResourceNumberParams>,
) -> AppResult<Json<DataResponse<CheckoutView>>> {
    input.validate()?;
    let view = state
        .coordinator
        .request_checkout(input.resource_type, &input.number, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// GET /checkout
pub async fn list(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<CheckoutView>>>> {
    let views = state.coordinator.list_checkouts().await;
    Ok(Json(DataResponse { data: views }))
}

/// POST /checkout/{id}/claim
pub async fn claim(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<CheckoutView>>> {
    let view = state.coordinator.claim_checkout(&id, &user.user_id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /checkout/{id}/confirm-items
pub async fn confirm_items(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<CheckoutView>>> {
    let view = state
        .coordinator
        .confirm_checkout_items(&id, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /checkout/{id}/mark-fee-paid
pub async fn mark_fee_paid(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<CheckoutView>>> {
    let view = state
        .coordinator
        .mark_checkout_fee_paid(&id, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /checkout/{id}/complete
pub async fn complete(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<CheckoutCompletedPayload>>> {
    let completed = state
        .coordinator
        .complete_checkout(&id, &user.user_id)
        .await?;
    Ok(Json(DataResponse { data: completed }))
}

/// POST /checkout/{id}/cancel
pub async fn cancel(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<CheckoutView>>> {
    let view = state.coordinator.cancel_checkout(&id, &user.user_id).await?;
    Ok(Json(DataResponse { data: view }))
}
