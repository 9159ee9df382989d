/// Session REST API endpoints
///
/// Start/resume, read, payload edits, navigation, branch transitions, explicit
/// save and teardown of live workflow sessions.

use crate::api::{engine_error, rejection, session_not_found, ApiError, AppState};
use crate::error::{NavigationRejection, Notice};
use crate::runtime::{BranchOutcome, SaveStatus, WorkflowOrchestrator, WorkflowState};
use crate::workflow::types::{FlowKind, FlowVariant};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Request body for starting or resuming a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub flow_kind: String,
    pub flow_variant: Option<String>,
    /// Id taken from a resume link, if any
    pub resume_session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub state: WorkflowState,
    pub notices: Vec<Notice>,
    pub resumed: bool,
}

/// Request body for a branch transition
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRequest {
    pub flow_variant: String,
    #[serde(default)]
    pub seed: Value,
}

pub fn create_session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}", delete(close_session))
        .route("/api/sessions/{id}/phases/{phase_id}", put(update_phase))
        .route("/api/sessions/{id}/advance", post(advance))
        .route("/api/sessions/{id}/back", post(back))
        .route("/api/sessions/{id}/jump/{phase_id}", post(jump))
        .route("/api/sessions/{id}/branch", post(branch))
        .route("/api/sessions/{id}/save", post(save))
}

async fn live_session(state: &AppState, id: &str) -> Result<Arc<WorkflowOrchestrator>, ApiError> {
    state.hub.get(id).await.ok_or_else(|| session_not_found(id))
}

/// POST /api/sessions
/// Body: { "flowKind": "intake", "flowVariant": "campaign"?, "resumeSessionId": "..."? }
async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let kind: FlowKind = request.flow_kind.parse().map_err(engine_error)?;
    let variant = request
        .flow_variant
        .as_deref()
        .map(str::parse::<FlowVariant>)
        .transpose()
        .map_err(engine_error)?;

    let outcome = state
        .hub
        .start(kind, variant, request.resume_session_id.as_deref())
        .await
        .map_err(engine_error)?;

    Ok(Json(StartSessionResponse {
        state: outcome.state,
        notices: outcome.notices,
        resumed: outcome.resumed,
    }))
}

/// GET /api/sessions/{id}
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowState>, ApiError> {
    let session = live_session(&state, &id).await?;
    Ok(Json(session.state()))
}

/// PUT /api/sessions/{id}/phases/{phase_id}
/// Body: the phase payload, stored as-is
async fn update_phase(
    State(state): State<AppState>,
    Path((id, phase_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<WorkflowState>, ApiError> {
    let session = live_session(&state, &id).await?;
    session
        .update_phase_payload(&phase_id, payload)
        .map(Json)
        .map_err(engine_error)
}

fn navigated(result: Result<WorkflowState, NavigationRejection>) -> Result<Json<WorkflowState>, ApiError> {
    result.map(Json).map_err(rejection)
}

/// POST /api/sessions/{id}/advance
async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowState>, ApiError> {
    navigated(live_session(&state, &id).await?.advance())
}

/// POST /api/sessions/{id}/back
async fn back(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowState>, ApiError> {
    navigated(live_session(&state, &id).await?.back())
}

/// POST /api/sessions/{id}/jump/{phase_id}
async fn jump(
    State(state): State<AppState>,
    Path((id, phase_id)): Path<(String, String)>,
) -> Result<Json<WorkflowState>, ApiError> {
    navigated(live_session(&state, &id).await?.jump_to(&phase_id))
}

/// POST /api/sessions/{id}/branch
/// Body: { "flowVariant": "campaign", "seed": { "projectName": "..." } }
async fn branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BranchRequest>,
) -> Result<Json<BranchOutcome>, ApiError> {
    let target: FlowVariant = request.flow_variant.parse().map_err(engine_error)?;
    let session = live_session(&state, &id).await?;
    session
        .transition_branch(target, &request.seed)
        .map(Json)
        .map_err(engine_error)
}

/// POST /api/sessions/{id}/save
async fn save(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaveStatus>, ApiError> {
    let session = live_session(&state, &id).await?;
    session.save_now().await.map(Json).map_err(engine_error)
}

/// DELETE /api/sessions/{id}
/// Stops autosave and drops the live session; the draft stays resumable.
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.hub.close(&id).await {
        tracing::info!("Closed session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(session_not_found(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_draft_routes;
    use crate::draft::{memory::InMemoryDraftStore, storage::DraftStore};
    use crate::runtime::{SessionHub, WorkflowEngine};
    use crate::workflow::registry::RegistryCatalog;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        let store: Arc<dyn DraftStore> = Arc::new(InMemoryDraftStore::new());
        let catalog = Arc::new(RegistryCatalog::with_builtin().unwrap());
        let hub = Arc::new(SessionHub::new(WorkflowEngine::new(catalog, store)));
        create_session_routes()
            .merge(create_draft_routes())
            .with_state(AppState { hub })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn start(app: &Router) -> String {
        let (status, body) = call(app, "POST", "/api/sessions", Some(json!({ "flowKind": "intake" }))).await;
        assert_eq!(status, StatusCode::OK);
        body["state"]["sessionId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn start_with_unknown_kind_is_bad_request() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/sessions", Some(json!({ "flowKind": "onboarding" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("onboarding"));
    }

    #[tokio::test]
    async fn broken_resume_link_starts_over_with_notice() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/api/sessions",
            Some(json!({ "flowKind": "intake", "flowVariant": "default", "resumeSessionId": "does-not-exist" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["sessionId"], "does-not-exist");
        assert_eq!(body["state"]["currentPhaseId"], "basic");
        assert_eq!(body["notices"][0]["kind"], "draft_not_found");
        assert_eq!(body["resumed"], false);
    }

    #[tokio::test]
    async fn locked_jump_is_a_conflict_with_reason() {
        let app = app();
        let id = start(&app).await;

        let (status, body) = call(&app, "POST", &format!("/api/sessions/{id}/jump/content"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["rejection"]["reason"], "phase_locked");
        assert_eq!(body["rejection"]["blocked_by"], "assets");
    }

    #[tokio::test]
    async fn payload_then_advance_moves_forward() {
        let app = app();
        let id = start(&app).await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/sessions/{id}/phases/basic"),
            Some(json!({ "brand": "Cardiora", "capturedAt": "2024-05-01T09:00:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["completedPhaseIds"], json!(["basic"]));

        let (status, body) = call(&app, "POST", &format!("/api/sessions/{id}/advance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentPhaseId"], "assets");
    }

    #[tokio::test]
    async fn branch_without_required_seed_is_bad_request() {
        let app = app();
        let id = start(&app).await;

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/sessions/{id}/branch"),
            Some(json!({ "flowVariant": "campaign", "seed": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, state) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(state["flowVariant"], "default");
    }

    #[tokio::test]
    async fn save_close_and_discard() {
        let app = app();
        let id = start(&app).await;
        call(&app, "PUT", &format!("/api/sessions/{id}/phases/basic"), Some(json!({ "brand": "Cardiora" }))).await;

        let (status, body) = call(&app, "POST", &format!("/api/sessions/{id}/save"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "saved");

        let (status, _) = call(&app, "DELETE", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/api/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = call(&app, "GET", "/api/drafts", None).await;
        assert_eq!(body["drafts"][0]["sessionId"], id.as_str());

        let (status, _) = call(&app, "DELETE", &format!("/api/drafts/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "DELETE", &format!("/api/drafts/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
