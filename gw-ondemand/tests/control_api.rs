//! Control API tests.
//!
//! Drives the axum router end to end with an in-memory backend.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{FakeBackend, INSTANCE_ID};
use gw_ondemand::actuator::Actuator;
use gw_ondemand::error::ControlError;
use gw_ondemand::router::{build_router, Controller, CORS_HEADERS};
use gw_ondemand::types::ResourceState;
use serde_json::Value;
use tower::ServiceExt;

fn router(backend: &Arc<FakeBackend>) -> Router {
    let controller = Controller::new(Actuator::new(backend.clone()), INSTANCE_ID);
    build_router(Arc::new(controller))
}

async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, headers, body)
}

fn assert_cors(headers: &axum::http::HeaderMap) {
    for (name, value) in CORS_HEADERS {
        assert_eq!(headers.get(name).unwrap(), value, "header {name}");
    }
}

#[tokio::test]
async fn preflight_returns_ok_with_cors() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let (status, headers, body) = send(router(&backend), "OPTIONS", "/anything").await;

    assert_eq!(status, StatusCode::OK);
    assert_cors(&headers);
    assert_eq!(body, serde_json::json!({ "message": "OK" }));
    assert_eq!(backend.describes(), 0);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let (status, headers, body) = send(router(&backend), "GET", "/unknown").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_cors(&headers);
    assert_eq!(body["error"], "NotFound");
    assert_eq!(body["message"], "Not found: GET /unknown");
    assert_eq!(backend.describes(), 0);
}

#[tokio::test]
async fn wrong_method_is_not_found() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let (status, _, body) = send(router(&backend), "GET", "/start").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
    assert_eq!(backend.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_from_stopped_waits_for_address() {
    let backend = Arc::new(
        FakeBackend::new(ResourceState::Stopped)
            .with_start_sequence(&[ResourceState::Pending, ResourceState::Running])
            .with_address_on_running("10.0.0.5"),
    );

    let (status, headers, body) = send(router(&backend), "POST", "/start").await;

    assert_eq!(status, StatusCode::OK);
    assert_cors(&headers);
    assert_eq!(body["action"], "start");
    assert_eq!(body["message"], "Instance started successfully");
    assert_eq!(body["instanceId"], INSTANCE_ID);
    assert_eq!(body["state"], "running");
    assert_eq!(body["publicIp"], "10.0.0.5");
    assert_eq!(body["instanceType"], "t3.micro");
    assert_eq!(backend.starts(), 1);
}

#[tokio::test]
async fn start_twice_on_running_is_identical() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Running).with_public_ip("10.0.0.5"));

    let first = send(router(&backend), "POST", "/start").await;
    let second = send(router(&backend), "POST", "/start").await;

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(first.2, second.2);
    assert_eq!(first.2["message"], "Instance is already running");
    assert_eq!(backend.starts(), 0);
}

#[tokio::test]
async fn stop_running_instance() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Running));
    let (status, _, body) = send(router(&backend), "POST", "/prod/stop").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "stop");
    assert_eq!(body["message"], "Instance stop initiated");
    assert_eq!(body["state"], "stopping");
    assert_eq!(backend.stops(), 1);
}

#[tokio::test]
async fn stop_stopped_instance_is_noop() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let (status, _, body) = send(router(&backend), "POST", "/stop").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Instance is already stopped");
    assert!(body.get("publicIp").is_none());
    assert_eq!(backend.stops(), 0);
}

#[tokio::test]
async fn status_reports_snapshot() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Running).with_public_ip("10.0.0.5"));
    let (status, headers, body) = send(router(&backend), "GET", "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_cors(&headers);
    assert_eq!(body["action"], "status");
    assert_eq!(body["state"], "running");
    assert_eq!(body["publicIp"], "10.0.0.5");
}

#[tokio::test]
async fn authorization_error_is_forbidden() {
    for (method, uri) in [("POST", "/start"), ("POST", "/stop"), ("GET", "/status")] {
        let backend = Arc::new(
            FakeBackend::new(ResourceState::Stopped)
                .with_describe_error(ControlError::Authorization("denied".into())),
        );
        let (status, headers, body) = send(router(&backend), method, uri).await;

        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert_cors(&headers);
        assert_eq!(body["error"], "Forbidden");
        assert_eq!(body["message"], "Insufficient permissions");
    }
}

#[tokio::test]
async fn missing_instance_is_not_found() {
    let backend = Arc::new(
        FakeBackend::new(ResourceState::Stopped)
            .with_describe_error(ControlError::NotFound(INSTANCE_ID.into())),
    );
    let (status, _, body) = send(router(&backend), "GET", "/status").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
    assert_eq!(body["message"], format!("Instance not found: {INSTANCE_ID}"));
}

#[tokio::test]
async fn validation_error_is_bad_request() {
    let backend = Arc::new(
        FakeBackend::new(ResourceState::Stopped)
            .with_describe_error(ControlError::Validation("instance_id cannot be empty".into())),
    );
    let (status, _, body) = send(router(&backend), "GET", "/status").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
    assert_eq!(body["message"], "instance_id cannot be empty");
}

#[tokio::test]
async fn provider_error_carries_provider_code() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped).with_start_error(
        ControlError::Provider {
            code: "InsufficientInstanceCapacity".into(),
            message: "Insufficient capacity.".into(),
        },
    ));
    let (status, headers, body) = send(router(&backend), "POST", "/start").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&headers);
    assert_eq!(body["error"], "InsufficientInstanceCapacity");
    assert_eq!(body["message"], "AWS error: Insufficient capacity.");
}

#[tokio::test(start_paused = true)]
async fn start_timeout_is_internal_error() {
    // Never leaves pending
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let (status, _, body) = send(router(&backend), "POST", "/start").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "InternalError");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Internal server error:"));
    assert_eq!(backend.starts(), 1);
}

#[tokio::test]
async fn controller_handles_without_http() {
    let backend = Arc::new(FakeBackend::new(ResourceState::Stopped));
    let controller = Controller::new(Actuator::new(backend.clone()), INSTANCE_ID);

    let resp = controller.handle("GET", "/status").await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.headers, CORS_HEADERS.to_vec());
    assert_eq!(resp.body["state"], "stopped");
}
