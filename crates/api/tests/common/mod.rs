#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use frontdesk_api::auth::jwt::{generate_access_token, JwtConfig};
use frontdesk_api::config::ServerConfig;
use frontdesk_api::engine::{Coordinator, CoordinatorSettings, VenueSeed};
use frontdesk_api::router::build_app_router;
use frontdesk_api::state::AppState;
use frontdesk_api::ws::WsManager;
use frontdesk_core::roles::{ROLE_EMPLOYEE, ROLE_KIOSK};
use frontdesk_events::EventBus;

pub const TEST_SECRET: &str = "test-secret-do-not-use-in-production";

/// Build a test `ServerConfig` with safe defaults and no database.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        demo_mode: false,
        rental_block_hours: 6,
        venue_seed_path: None,
        database_url: None,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Everything a test needs to drive the server and watch its events.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// Build the full application router over the demo venue, using the same
/// middleware stack as `main.rs`.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let coordinator = Arc::new(Coordinator::new(
        VenueSeed::demo(),
        CoordinatorSettings::from_config(&config),
        Arc::clone(&event_bus),
    ));

    let state = AppState {
        pool: None,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        event_bus,
        coordinator,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
    }
}

pub fn token(subject: &str, role: &str) -> String {
    generate_access_token(subject, role, &test_config().jwt).unwrap()
}

pub fn employee_token() -> String {
    token("emp-1", ROLE_EMPLOYEE)
}

pub fn second_employee_token() -> String {
    token("emp-2", ROLE_EMPLOYEE)
}

pub fn kiosk_token() -> String {
    token("kiosk-lane-1", ROLE_KIOSK)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_auth(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn post_empty(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), None).await
}

pub async fn patch_auth(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
