/// HTTP API Layer
///
/// REST endpoints over the session hub:
/// - Session lifecycle, payload edits and navigation
/// - Draft listing and discard
///
/// Navigation rejections map to `409 Conflict` with the structured reason as the
/// body, configuration errors to `400`, unknown live sessions to `404`.

use crate::error::{EngineError, NavigationRejection};
use crate::runtime::SessionHub;
use axum::{http::StatusCode, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

// Session lifecycle and navigation endpoints
pub mod sessions;

// Draft listing and discard endpoints
pub mod drafts;

pub use drafts::create_draft_routes;
pub use sessions::create_session_routes;

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SessionHub>,
}

/// Error response: status plus a JSON body with an `error` field
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn engine_error(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::Configuration(_) => StatusCode::BAD_REQUEST,
        EngineError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Inactive(_) => StatusCode::CONFLICT,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

pub(crate) fn rejection(rejection: NavigationRejection) -> ApiError {
    let message = rejection.to_string();
    let detail = serde_json::to_value(&rejection).unwrap_or(Value::Null);
    (
        StatusCode::CONFLICT,
        Json(json!({ "error": message, "rejection": detail })),
    )
}

pub(crate) fn session_not_found(session_id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no live session '{}'", session_id) })),
    )
}
