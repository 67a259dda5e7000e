/// Session REST API endpoints
///
/// Starts question sessions, resumes suspended ones with reviewer feedback,
/// and lets operators inspect or discard pending checkpoints. Every run is
/// driven until it completes or suspends before the response is sent.

use crate::{
    error::WorkflowError,
    runtime::engine::{Run, RunEvent, RunOutcome, WorkflowEngine},
    workflow::types::{Checkpoint, CheckpointSummary, InterruptPayload, SessionState},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared state for the session routes
#[derive(Clone)]
pub struct SessionAppState {
    pub engine: Arc<WorkflowEngine>,
}

/// Request body for starting a session
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub question: String,
    /// Caller-chosen thread id; generated when absent
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Request body for resuming a suspended session
#[derive(Debug, Deserialize)]
pub struct ResumeSessionRequest {
    /// REGENERATE, CONTINUE, ADDITIONAL_INPUT or free text
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Suspended,
}

/// Everything one run produced
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub thread_id: String,
    pub status: RunStatus,
    pub events: Vec<RunEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<InterruptPayload>,
    pub state: SessionState,
}

/// Create session routes
pub fn create_session_routes() -> Router<SessionAppState> {
    Router::new()
        .route("/api/sessions", post(start_session).get(list_sessions))
        .route(
            "/api/sessions/{thread_id}",
            get(get_session).delete(delete_session),
        )
        .route("/api/sessions/{thread_id}/resume", post(resume_session))
}

/// Start a session
///
/// POST /api/sessions
/// Body: { "question": "...", "thread_id": "optional" }
async fn start_session(
    State(state): State<SessionAppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<RunReport>, StatusCode> {
    let run = state
        .engine
        .run(&payload.question, payload.thread_id)
        .map_err(error_status)?;

    drive(run).await.map(Json).map_err(error_status)
}

/// Resume a suspended session
///
/// POST /api/sessions/{thread_id}/resume
/// Body: { "feedback": "REGENERATE" }
async fn resume_session(
    State(state): State<SessionAppState>,
    Path(thread_id): Path<String>,
    Json(payload): Json<ResumeSessionRequest>,
) -> Result<Json<RunReport>, StatusCode> {
    let run = state
        .engine
        .resume(&thread_id, &payload.feedback)
        .await
        .map_err(error_status)?;

    drive(run).await.map(Json).map_err(error_status)
}

/// List suspended sessions
///
/// GET /api/sessions
async fn list_sessions(
    State(state): State<SessionAppState>,
) -> Result<Json<Vec<CheckpointSummary>>, StatusCode> {
    state.engine.pending().await.map(Json).map_err(error_status)
}

/// Show the checkpoint of a suspended session
///
/// GET /api/sessions/{thread_id}
async fn get_session(
    State(state): State<SessionAppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Checkpoint>, StatusCode> {
    state
        .engine
        .inspect(&thread_id)
        .await
        .map(Json)
        .map_err(error_status)
}

/// Discard a suspended session
///
/// DELETE /api/sessions/{thread_id}
async fn delete_session(
    State(state): State<SessionAppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state
        .engine
        .discard(&thread_id)
        .await
        .map_err(error_status)?;

    Ok(Json(json!({
        "thread_id": thread_id,
        "message": "Session discarded"
    })))
}

/// Poll a run to its end, keeping every event
async fn drive(mut run: Run) -> Result<RunReport, WorkflowError> {
    let mut events = Vec::new();
    while let Some(event) = run.next().await {
        events.push(event?);
    }

    let thread_id = run.thread_id().to_string();
    let report = match run.into_outcome()? {
        RunOutcome::Completed { state } => RunReport {
            thread_id,
            status: RunStatus::Completed,
            events,
            interrupt: None,
            state,
        },
        RunOutcome::Suspended { state, payload } => RunReport {
            thread_id,
            status: RunStatus::Suspended,
            events,
            interrupt: Some(payload),
            state,
        },
    };
    Ok(report)
}

/// Map engine errors onto HTTP status codes
fn error_status(err: WorkflowError) -> StatusCode {
    match &err {
        WorkflowError::UnknownSession(_) => {
            tracing::debug!("🔍 {}", err);
            StatusCode::NOT_FOUND
        }
        WorkflowError::InvalidRequest(_) => {
            tracing::debug!("🚫 {}", err);
            StatusCode::BAD_REQUEST
        }
        WorkflowError::Collaborator(_) => {
            tracing::error!("❌ Collaborator failure: {}", err);
            StatusCode::BAD_GATEWAY
        }
        WorkflowError::MalformedState(_) | WorkflowError::Store(_) => {
            tracing::error!("❌ Session failure: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
