pub mod checkout;
pub mod health;
pub mod inventory;
pub mod lane;
pub mod waitlist;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws?lane={lane}                                   WebSocket event stream
///
/// /checkin/lane/{lane}/start                        start or attach (staff)
/// /checkin/lane/{lane}/session                      current snapshot
/// /checkin/lane/{lane}/propose-selection            propose a tier
/// /checkin/lane/{lane}/confirm-selection            lock the proposal
/// /checkin/lane/{lane}/acknowledge-selection        acknowledge a lock
/// /checkin/lane/{lane}/waitlist                     join the waitlist
/// /checkin/lane/{lane}/payment-intent               quote and open intent (staff)
/// /checkin/lane/{lane}/mark-paid                    record payment (staff)
/// /checkin/lane/{lane}/payment-failed               record decline (staff)
/// /checkin/lane/{lane}/sign-agreement               customer signature (kiosk)
/// /checkin/lane/{lane}/manual-signature-override    staff signature (staff)
/// /checkin/lane/{lane}/assign                       assign a resource (staff)
/// /checkin/lane/{lane}/confirm-assignment           accept cross-type (kiosk)
/// /checkin/lane/{lane}/decline-assignment           decline cross-type (kiosk)
/// /checkin/lane/{lane}/complete                     finish check-in (staff)
/// /checkin/lane/{lane}/reset                        clear the lane
///
/// /checkout                                         list requests
/// /checkout/resolve                                 resolve a key tag
/// /checkout/request                                 raise a request
/// /checkout/{id}/claim                              claim (staff)
/// /checkout/{id}/confirm-items                      items returned (staff)
/// /checkout/{id}/mark-fee-paid                      late fee settled (staff)
/// /checkout/{id}/complete                           complete (staff)
/// /checkout/{id}/cancel                             cancel (staff)
///
/// /inventory/detailed                               rooms and lockers
/// /inventory/{resource_type}/{id}/status            housekeeping (staff)
///
/// /waitlist                                         list entries
/// /waitlist/{id}/offer                              offer a resource (staff)
/// /waitlist/{id}/fulfill                            move the visit (staff)
/// /waitlist/{id}/cancel                             cancel (staff)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/checkin/lane", lane::router())
        .nest("/checkout", checkout::router())
        .nest("/inventory", inventory::router())
        .nest("/waitlist", waitlist::router())
}
