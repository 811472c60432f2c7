use axum::routing::{get, post};
use axum::Router;

use crate::handlers::waitlist;
use crate::state::AppState;

/// Waitlist routes mounted at `/waitlist`.
///
/// ```text
/// GET    /                  -> list
/// POST   /{id}/offer        -> offer
/// POST   /{id}/fulfill      -> fulfill
/// POST   /{id}/cancel       -> cancel
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(waitlist::list))
        .route("/{id}/offer", post(waitlist::offer))
        .route("/{id}/fulfill", post(waitlist::fulfill))
        .route("/{id}/cancel", post(waitlist::cancel))
}
