//! Control API router.
//!
//! Maps `(method, path)` onto start/stop/status and translates control errors
//! into HTTP status codes and `{error, message}` bodies. The mapping lives in
//! [`Controller::handle`]; [`build_router`] mounts it on axum as a fallback
//! handler so every request, known route or not, goes through it.
//!
//! | Method | Path suffix | Operation |
//! |---|---|---|
//! | OPTIONS | any | CORS preflight |
//! | POST | `/start` | start and wait for running |
//! | POST | `/stop` | stop (fire and forget) |
//! | GET | `/status` | describe |

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};

use crate::actuator::{Actuator, ControlAction, LifecycleOutcome};
use crate::error::ControlError;
use crate::types::ManagedResource;

/// Headers attached to every control API response.
pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "Content-Type,X-Amz-Date,Authorization,X-Api-Key,x-api-key",
    ),
    ("Access-Control-Allow-Methods", "GET,POST,OPTIONS"),
    ("Content-Type", "application/json"),
];

/// Resolved operation for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// CORS preflight for any path
    Preflight,
    /// `POST .../start`
    Start,
    /// `POST .../stop`
    Stop,
    /// `GET .../status`
    Status,
    /// Anything else
    NotFound,
}

/// Resolve `(method, path)` to a route. Paths match on their suffix so the
/// API can sit behind any stage or prefix.
pub fn route(method: &str, path: &str) -> Route {
    match method {
        "OPTIONS" => Route::Preflight,
        "POST" if path.ends_with("/start") => Route::Start,
        "POST" if path.ends_with("/stop") => Route::Stop,
        "GET" if path.ends_with("/status") => Route::Status,
        _ => Route::NotFound,
    }
}

/// Transport-independent response.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Response headers, always the CORS set
    pub headers: Vec<(&'static str, &'static str)>,
    /// JSON body
    pub body: Value,
}

impl ControlResponse {
    fn new(status_code: u16, body: Value) -> Self {
        Self {
            status_code,
            headers: CORS_HEADERS.to_vec(),
            body,
        }
    }

    fn error(status_code: u16, tag: &str, message: String) -> Self {
        Self::new(status_code, json!({ "error": tag, "message": message }))
    }
}

impl IntoResponse for ControlResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body.to_string()).into_response();

        for (name, value) in self.headers {
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => log::warn!("Dropping invalid response header {}", name),
            }
        }
        response
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody<'a> {
    action: ControlAction,
    message: &'a str,
    #[serde(flatten)]
    resource: &'a ManagedResource,
}

/// Serves control requests for one instance.
#[derive(Clone)]
pub struct Controller {
    actuator: Actuator,
    instance_id: String,
}

impl Controller {
    /// Create a controller for `instance_id`
    pub fn new(actuator: Actuator, instance_id: impl Into<String>) -> Self {
        Self {
            actuator,
            instance_id: instance_id.into(),
        }
    }

    /// Handle one request. Never fails: errors become JSON error responses.
    pub async fn handle(&self, method: &str, path: &str) -> ControlResponse {
        let route = route(method, path);
        if route == Route::Preflight {
            return ControlResponse::new(200, json!({ "message": "OK" }));
        }

        log::info!("Processing {} {}", method, path);

        let result = match route {
            Route::Start => self.actuator.start(&self.instance_id).await,
            Route::Stop => self.actuator.stop(&self.instance_id).await,
            Route::Status => self.actuator.status(&self.instance_id).await,
            Route::Preflight | Route::NotFound => {
                return ControlResponse::error(
                    404,
                    "NotFound",
                    format!("Not found: {} {}", method, path),
                );
            }
        };

        match result {
            Ok(outcome) => success(&outcome),
            Err(e) => self.error_response(&e),
        }
    }

    fn error_response(&self, err: &ControlError) -> ControlResponse {
        let message = match err {
            ControlError::Authorization(_) => "Insufficient permissions".to_string(),
            ControlError::NotFound(_) => format!("Instance not found: {}", self.instance_id),
            ControlError::Validation(msg) => msg.clone(),
            ControlError::Provider { message, .. } => format!("AWS error: {}", message),
            ControlError::WaitTimeout { .. } | ControlError::Internal(_) => {
                log::error!("Unexpected error handling control request: {}", err);
                format!("Internal server error: {}", err)
            }
        };
        ControlResponse::error(err.status_code(), err.error_tag(), message)
    }
}

fn success(outcome: &LifecycleOutcome) -> ControlResponse {
    let body = SuccessBody {
        action: outcome.action,
        message: &outcome.message,
        resource: &outcome.resource,
    };

    match serde_json::to_value(&body) {
        Ok(body) => ControlResponse::new(200, body),
        Err(e) => ControlResponse::error(
            500,
            "InternalError",
            format!("Internal server error: {}", e),
        ),
    }
}

/// Build the axum router serving the control API.
pub fn build_router(controller: Arc<Controller>) -> Router {
    Router::new().fallback(dispatch).with_state(controller)
}

async fn dispatch(
    State(controller): State<Arc<Controller>>,
    method: Method,
    uri: Uri,
) -> ControlResponse {
    controller.handle(method.as_str(), uri.path()).await
}
