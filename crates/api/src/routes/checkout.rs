use axum::routing::{get, post};
use axum::Router;

use crate::handlers::checkout;
use crate::state::AppState;

/// Checkout routes mounted at `/checkout`.
///
/// ```text
/// GET    /                        -> list
/// GET    /resolve                 -> resolve
/// POST   /request                 -> request
/// POST   /{id}/claim              -> claim
/// POST   /{id}/confirm-items      -> confirm_items
/// POST   /{id}/mark-fee-paid      -> mark_fee_paid
/// POST   /{id}/complete           -> complete
/// POST   /{id}/cancel             -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::list))
        .route("/resolve", get(checkout::resolve))
        .route("/request", post(checkout::request))
        .route("/{id}/claim", post(checkout::claim))
        .route("/{id}/confirm-items", post(checkout::confirm_items))
        .route("/{id}/mark-fee-paid", post(checkout::mark_fee_paid))
        .route("/{id}/complete", post(checkout::complete))
        .route("/{id}/cancel", post(checkout::cancel))
}
