/// Draft REST API endpoints
///
/// Listing for a "resume a draft" picker and explicit discard.

use crate::api::{engine_error, ApiError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde_json::{json, Value};

pub fn create_draft_routes() -> Router<AppState> {
    Router::new()
        .route("/api/drafts", get(list_drafts))
        .route("/api/drafts/{id}", delete(discard_draft))
}

/// List stored drafts, newest first
///
/// GET /api/drafts
/// Returns: { "drafts": [{ "sessionId": "...", "flowKind": "...", "progressPercent": 50, ... }] }
async fn list_drafts(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let drafts = state.hub.list_drafts().await.map_err(engine_error)?;
    Ok(Json(json!({ "drafts": drafts })))
}

/// Discard a draft, tearing down its live session if there is one
///
/// DELETE /api/drafts/{id}
async fn discard_draft(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.hub.discard(&id).await.map_err(engine_error)? {
        tracing::info!("Discarded draft {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no draft '{}'", id) })),
        ))
    }
}
