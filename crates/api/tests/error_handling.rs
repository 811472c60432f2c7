//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly; no server is needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use frontdesk_api::error::AppError;
use frontdesk_core::error::{ConflictCode, CoreError, PreconditionCode};
use http_body_util::BodyExt;
use serde_json::json;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::not_found("CheckoutRequest", "abc"));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "CheckoutRequest with id abc not found");
}

#[tokio::test]
async fn precondition_returns_400_with_its_code() {
    let err = AppError::Core(CoreError::precondition(
        PreconditionCode::PaymentRequired,
        "Payment must be recorded before assignment",
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "PAYMENT_REQUIRED");
}

#[tokio::test]
async fn claim_holder_precondition_returns_403() {
    let err = AppError::Core(CoreError::precondition(
        PreconditionCode::NotClaimHolder,
        "Claimed by another employee",
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "NOT_CLAIM_HOLDER");
}

#[tokio::test]
async fn conflict_merges_details_into_body() {
    let err = AppError::Core(CoreError::conflict_with(
        ConflictCode::RaceLost,
        "Resource was taken",
        json!({ "raceLost": true, "code": "SHADOWED" }),
    ));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "RACE_LOST");
    assert_eq!(json["raceLost"], true);
    assert_eq!(json["error"], "Resource was taken");
}

#[tokio::test]
async fn bad_request_error_returns_400() {
    let err = AppError::BadRequest("invalid field value".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
    assert_eq!(json["error"], "invalid field value");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("reason is required".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "reason is required");
}

#[tokio::test]
async fn unauthorized_and_forbidden_map_to_401_and_403() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("no token".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Forbidden("kiosk only".into()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn internal_errors_are_sanitized() {
    for err in [
        AppError::InternalError("secret database credentials leaked".into()),
        AppError::Core(CoreError::Internal("secret stack trace".into())),
    ] {
        let (status, json) = error_to_response(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json.to_string().contains("secret"));
        assert_eq!(json["error"], "An internal error occurred");
    }
}
