//! Handlers for lane sessions: start, the selection handshake, payment,
//! agreement, assignment, completion and reset.

use axum::extract::{Path, State};
use axum::Json;
use frontdesk_core::customer::CustomerLookup;
use frontdesk_core::error::CoreError;
use frontdesk_core::lane::{LaneSession, LaneSnapshot, Mode};
use frontdesk_core::rental::{Actor, RentalTier, ResourceRef, ResourceType};
use frontdesk_core::types::{DbId, Timestamp};
use frontdesk_core::waitlist::WaitlistEntry;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::{Assignment, CheckinCompleted};
use crate::error::{AppError, AppResult};
use crate::middleware::rbac::{RequireAuth, RequireKiosk, RequireStaff};
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest accepted lane identifier.
const MAX_LANE_ID_LEN: usize = 64;

/// Lane ids are short slugs such as `lane-1`.
pub(crate) fn validate_lane_id(lane: &str) -> AppResult<&str> {
    let valid = !lane.is_empty()
        && lane.len() <= MAX_LANE_ID_LEN
        && lane
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(lane)
    } else {
        Err(AppError::Core(CoreError::Validation(format!(
            "Invalid lane id '{lane}'"
        ))))
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub customer_id: Option<DbId>,
    #[validate(length(min = 1, max = 2048))]
    pub id_scan_value: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub membership_scan_value: Option<String>,
    #[serde(default)]
    pub mode: Mode,
}

impl StartSessionRequest {
    /// Exactly one identifier must be present.
    fn lookup(self) -> AppResult<CustomerLookup> {
        match (self.customer_id, self.id_scan_value, self.membership_scan_value) {
            (Some(id), None, None) => Ok(CustomerLookup::Id(id)),
            (None, Some(scan), None) => Ok(CustomerLookup::IdScan(scan)),
            (None, None, Some(number)) => Ok(CustomerLookup::Membership(number)),
            _ => Err(AppError::Core(CoreError::Validation(
                "Provide exactly one of customerId, idScanValue, membershipScanValue".into(),
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub customer_name: String,
    pub membership_number: Option<String>,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_ends_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_assigned_resource_type: Option<ResourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_assigned_resource_number: Option<String>,
}

impl From<LaneSession> for StartSessionResponse {
    fn from(s: LaneSession) -> Self {
        Self {
            session_id: s.session_id,
            customer_name: s.customer_name,
            membership_number: s.membership_number,
            mode: s.mode,
            block_ends_at: s.block_ends_at,
            active_assigned_resource_type: s.active_assigned_resource_type,
            active_assigned_resource_number: s.active_assigned_resource_number,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeSelectionRequest {
    pub rental_type: RentalTier,
    pub proposed_by: Actor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmSelectionRequest {
    pub confirmed_by: Actor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeSelectionRequest {
    pub acknowledged_by: Actor,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinWaitlistRequest {
    pub desired_tier: RentalTier,
    pub backup_tier: RentalTier,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    #[validate(length(min = 1, max = 128))]
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub resource_type: ResourceType,
    pub resource_id: DbId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub cleared: bool,
}

type Data<T> = AppResult<Json<DataResponse<T>>>;

fn data<T: Serialize>(data: T) -> Data<T> {
    Ok(Json(DataResponse { data }))
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// POST /checkin/lane/{lane}/start
pub async fn start_session(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<StartSessionRequest>,
) -> Data<StartSessionResponse> {
    let lane = validate_lane_id(&lane)?;
    input.validate()?;
    let mode = input.mode;
    let lookup = input.lookup()?;

    let session = state
        .coordinator
        .start_session(lane, &lookup, mode, &user.user_id)
        .await?;
    data(session.into())
}

/// GET /checkin/lane/{lane}/session
pub async fn get_session(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<LaneSnapshot> {
    let lane = validate_lane_id(&lane)?;
    data(state.coordinator.snapshot(lane).await)
}

/// POST /checkin/lane/{lane}/complete
pub async fn complete_checkin(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<CheckinCompleted> {
    let lane = validate_lane_id(&lane)?;
    data(state.coordinator.complete_checkin(lane, &user.user_id).await?)
}

/// POST /checkin/lane/{lane}/reset
pub async fn reset_lane(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<ResetResponse> {
    let lane = validate_lane_id(&lane)?;
    let cleared = state.coordinator.clear(lane, &user.user_id).await?;
    data(ResetResponse { cleared })
}

// ---------------------------------------------------------------------------
// Selection handshake
// ---------------------------------------------------------------------------

/// POST /checkin/lane/{lane}/propose-selection
pub async fn propose_selection(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<ProposeSelectionRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    user.require_actor(input.proposed_by)?;
    data(
        state
            .coordinator
            .propose_selection(lane, input.rental_type, input.proposed_by, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/confirm-selection
pub async fn confirm_selection(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<ConfirmSelectionRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    user.require_actor(input.confirmed_by)?;
    data(
        state
            .coordinator
            .confirm_selection(lane, input.confirmed_by, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/acknowledge-selection
pub async fn acknowledge_selection(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<AcknowledgeSelectionRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    user.require_actor(input.acknowledged_by)?;
    data(
        state
            .coordinator
            .acknowledge_selection(lane, input.acknowledged_by, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/waitlist
pub async fn join_waitlist(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<JoinWaitlistRequest>,
) -> Data<WaitlistEntry> {
    let lane = validate_lane_id(&lane)?;
    data(
        state
            .coordinator
            .join_waitlist(lane, input.desired_tier, input.backup_tier, &user.user_id)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Payment and agreement
// ---------------------------------------------------------------------------

/// POST /checkin/lane/{lane}/payment-intent
pub async fn create_payment_intent(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    data(
        state
            .coordinator
            .create_payment_intent(lane, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/mark-paid
pub async fn mark_paid(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<MarkPaidRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    input.validate()?;
    data(
        state
            .coordinator
            .mark_paid(lane, &input.payment_intent_id, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/payment-failed
pub async fn payment_failed(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<ReasonRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    input.validate()?;
    data(
        state
            .coordinator
            .record_payment_failure(lane, &input.reason, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/sign-agreement
pub async fn sign_agreement(
    RequireKiosk(user): RequireKiosk,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    data(state.coordinator.sign_agreement(lane, &user.user_id).await?)
}

/// POST /checkin/lane/{lane}/manual-signature-override
pub async fn manual_signature_override(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<ReasonRequest>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    input.validate()?;
    data(
        state
            .coordinator
            .override_signature(lane, &input.reason, &user.user_id)
            .await?,
    )
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// POST /checkin/lane/{lane}/assign
pub async fn assign(
    RequireStaff(user): RequireStaff,
    State(state): State<AppState>,
    Path(lane): Path<String>,
    Json(input): Json<AssignRequest>,
) -> Data<Assignment> {
    let lane = validate_lane_id(&lane)?;
    let target = ResourceRef {
        resource_type: input.resource_type,
        resource_id: input.resource_id,
    };
    data(state.coordinator.assign(lane, target, &user.user_id).await?)
}

/// POST /checkin/lane/{lane}/confirm-assignment
pub async fn confirm_assignment(
    RequireKiosk(user): RequireKiosk,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    data(
        state
            .coordinator
            .confirm_assignment(lane, &user.user_id)
            .await?,
    )
}

/// POST /checkin/lane/{lane}/decline-assignment
pub async fn decline_assignment(
    RequireKiosk(user): RequireKiosk,
    State(state): State<AppState>,
    Path(lane): Path<String>,
) -> Data<LaneSession> {
    let lane = validate_lane_id(&lane)?;
    data(
        state
            .coordinator
            .decline_assignment(lane, &user.user_id)
            .await?,
    )
}
