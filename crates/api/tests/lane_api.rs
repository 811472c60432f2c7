//! HTTP-level tests for the lane check-in flow, run against the in-memory
//! demo venue.

mod common;

use axum::http::StatusCode;
use axum::Router;
use common::{
    body_json, employee_token, get_auth, kiosk_token, post_auth, post_empty, second_employee_token,
};
use serde_json::{json, Value};

const LANE: &str = "/api/v1/checkin/lane/lane-1";

fn lane_uri(action: &str) -> String {
    format!("{LANE}/{action}")
}

async fn start(app: &Router, membership: &str) -> Value {
    let response = post_auth(
        app,
        &lane_uri("start"),
        &employee_token(),
        json!({ "membershipScanValue": membership }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["data"].clone()
}

/// Drive a session through selection, payment and agreement.
async fn ready_for_assignment(app: &Router, tier: &str) {
    let emp = employee_token();
    let kiosk = kiosk_token();

    let proposed = post_auth(
        app,
        &lane_uri("propose-selection"),
        &emp,
        json!({ "rentalType": tier, "proposedBy": "EMPLOYEE" }),
    )
    .await;
    assert_eq!(proposed.status(), StatusCode::OK);

    let confirmed = post_auth(
        app,
        &lane_uri("confirm-selection"),
        &kiosk,
        json!({ "confirmedBy": "CUSTOMER" }),
    )
    .await;
    assert_eq!(confirmed.status(), StatusCode::OK);

    let intent = body_json(post_empty(app, &lane_uri("payment-intent"), &emp).await).await;
    let intent_id = intent["data"]["paymentIntentId"].as_str().unwrap().to_string();

    let paid = post_auth(
        app,
        &lane_uri("mark-paid"),
        &emp,
        json!({ "paymentIntentId": intent_id }),
    )
    .await;
    assert_eq!(paid.status(), StatusCode::OK);

    let signed = post_empty(app, &lane_uri("sign-agreement"), &kiosk).await;
    assert_eq!(signed.status(), StatusCode::OK);
}

#[tokio::test]
async fn full_check_in_flow() {
    let app = common::build_test_app();
    let emp = employee_token();

    let started = start(&app.router, "M-1001").await;
    assert_eq!(started["customerName"], "Alex Rivera");
    assert_eq!(started["membershipNumber"], "M-1001");
    assert_eq!(started["mode"], "INITIAL");
    assert!(started["sessionId"].is_string());

    ready_for_assignment(&app.router, "STANDARD").await;

    let assigned = post_auth(
        &app.router,
        &lane_uri("assign"),
        &emp,
        json!({ "resourceType": "room", "resourceId": 1 }),
    )
    .await;
    assert_eq!(assigned.status(), StatusCode::OK);
    let assigned = body_json(assigned).await;
    assert_eq!(assigned["data"]["needsConfirmation"], false);

    let completed = post_empty(&app.router, &lane_uri("complete"), &emp).await;
    assert_eq!(completed.status(), StatusCode::OK);
    let completed = body_json(completed).await;
    assert_eq!(completed["data"]["assignedResourceNumber"], "101");
    assert_eq!(completed["data"]["rentalType"], "STANDARD");

    let snapshot = body_json(get_auth(&app.router, &lane_uri("session"), &emp).await).await;
    assert!(snapshot["data"]["session"].is_null());
    assert!(snapshot["data"]["revision"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn second_check_in_for_same_customer_reports_active_visit() {
    let app = common::build_test_app();
    let emp = employee_token();

    start(&app.router, "M-1002").await;
    ready_for_assignment(&app.router, "STANDARD").await;
    post_auth(
        &app.router,
        &lane_uri("assign"),
        &emp,
        json!({ "resourceType": "room", "resourceId": 2 }),
    )
    .await;
    post_empty(&app.router, &lane_uri("complete"), &emp).await;

    let again = post_auth(
        &app.router,
        "/api/v1/checkin/lane/lane-2/start",
        &emp,
        json!({ "idScanValue": "ID-2002" }),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    let body = body_json(again).await;
    assert_eq!(body["code"], "ALREADY_CHECKED_IN");
    assert_eq!(body["activeCheckin"]["assignedResourceNumber"], "102");
}

#[tokio::test]
async fn start_requires_exactly_one_identifier() {
    let app = common::build_test_app();

    let response = post_auth(
        &app.router,
        &lane_uri("start"),
        &employee_token(),
        json!({ "customerId": 1, "membershipScanValue": "M-1001" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn kiosk_cannot_start_sessions_or_act_as_employee() {
    let app = common::build_test_app();
    let kiosk = kiosk_token();

    let response = post_auth(
        &app.router,
        &lane_uri("start"),
        &kiosk,
        json!({ "customerId": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    start(&app.router, "M-1001").await;
    let response = post_auth(
        &app.router,
        &lane_uri("propose-selection"),
        &kiosk,
        json!({ "rentalType": "DOUBLE", "proposedBy": "EMPLOYEE" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn employee_cannot_sign_the_agreement() {
    let app = common::build_test_app();
    start(&app.router, "M-1001").await;

    let response = post_empty(&app.router, &lane_uri("sign-agreement"), &employee_token()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn assign_before_selection_is_a_precondition_failure() {
    let app = common::build_test_app();
    start(&app.router, "M-1001").await;

    let response = post_auth(
        &app.router,
        &lane_uri("assign"),
        &employee_token(),
        json!({ "resourceType": "room", "resourceId": 1 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "SELECTION_REQUIRED");
}

#[tokio::test]
async fn another_customer_cannot_take_an_occupied_lane() {
    let app = common::build_test_app();
    start(&app.router, "M-1001").await;

    let same = start(&app.router, "M-1001").await;
    assert_eq!(same["customerName"], "Alex Rivera");

    let response = post_auth(
        &app.router,
        &lane_uri("start"),
        &second_employee_token(),
        json!({ "customerId": 3 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "LANE_OCCUPIED");
}

#[tokio::test]
async fn reset_is_idempotent() {
    let app = common::build_test_app();
    let emp = employee_token();
    start(&app.router, "M-1003").await;

    let first = body_json(post_empty(&app.router, &lane_uri("reset"), &emp).await).await;
    assert_eq!(first["data"]["cleared"], true);

    let second = body_json(post_empty(&app.router, &lane_uri("reset"), &emp).await).await;
    assert_eq!(second["data"]["cleared"], false);
}

#[tokio::test]
async fn cross_tier_assignment_waits_for_the_kiosk() {
    let app = common::build_test_app();
    let emp = employee_token();
    start(&app.router, "M-1001").await;
    ready_for_assignment(&app.router, "STANDARD").await;

    // Room 201 (id 7) is a DOUBLE.
    let assigned = body_json(
        post_auth(
            &app.router,
            &lane_uri("assign"),
            &emp,
            json!({ "resourceType": "room", "resourceId": 7 }),
        )
        .await,
    )
    .await;
    assert_eq!(assigned["data"]["needsConfirmation"], true);

    let early = post_empty(&app.router, &lane_uri("complete"), &emp).await;
    assert_eq!(early.status(), StatusCode::BAD_REQUEST);

    let confirmed = post_empty(&app.router, &lane_uri("confirm-assignment"), &kiosk_token()).await;
    assert_eq!(confirmed.status(), StatusCode::OK);

    let completed = post_empty(&app.router, &lane_uri("complete"), &emp).await;
    assert_eq!(completed.status(), StatusCode::OK);
    assert_eq!(body_json(completed).await["data"]["rentalType"], "DOUBLE");
}

#[tokio::test]
async fn invalid_lane_ids_are_rejected() {
    let app = common::build_test_app();
    let response = get_auth(
        &app.router,
        "/api/v1/checkin/lane/bad%20lane/session",
        &employee_token(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
