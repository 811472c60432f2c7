use axum::routing::{get, patch};
use axum::Router;

use crate::handlers::inventory;
use crate::state::AppState;

/// Inventory routes mounted at `/inventory`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/detailed", get(inventory::detailed))
        .route(
            "/{resource_type}/{id}/status",
            patch(inventory::set_status),
        )
}
