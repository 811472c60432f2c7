use axum::routing::{get, post};
use axum::Router;

use crate::handlers::lane;
use crate::state::AppState;

/// Lane routes mounted at `/checkin/lane`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{lane}/start", post(lane::start_session))
        .route("/{lane}/session", get(lane::get_session))
        .route("/{lane}/propose-selection", post(lane::propose_selection))
        .route("/{lane}/confirm-selection", post(lane::confirm_selection))
        .route(
            "/{lane}/acknowledge-selection",
            post(lane::acknowledge_selection),
        )
        .route("/{lane}/waitlist", post(lane::join_waitlist))
        .route("/{lane}/payment-intent", post(lane::create_payment_intent))
        .route("/{lane}/mark-paid", post(lane::mark_paid))
        .route("/{lane}/payment-failed", post(lane::payment_failed))
        .route("/{lane}/sign-agreement", post(lane::sign_agreement))
        .route(
            "/{lane}/manual-signature-override",
            post(lane::manual_signature_override),
        )
        .route("/{lane}/assign", post(lane::assign))
        .route("/{lane}/confirm-assignment", post(lane::confirm_assignment))
        .route("/{lane}/decline-assignment", post(lane::decline_assignment))
        .route("/{lane}/complete", post(lane::complete_checkin))
        .route("/{lane}/reset", post(lane::reset_lane))
}
