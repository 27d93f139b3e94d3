use super::state::AppState;
use crate::error::LiveError;
use crate::session::{SessionState, SessionStatus, Turn};
use crate::store::{
    interview_system_prompt, AnalysisRecord, ChatMessage, NewPosition, PositionUpdate, StoreError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartInterviewResponse {
    pub session_id: String,
    pub position_id: String,
    pub state: SessionState,
}

#[derive(Debug, Serialize)]
pub struct StopInterviewResponse {
    pub state: SessionState,
    pub session_id: Option<String>,
    pub transcript: Vec<Turn>,
    pub error: Option<String>,
    /// Whether the transcript was written to the position's history
    pub saved: bool,
}

#[derive(Debug, Serialize)]
pub struct InterviewStatusResponse {
    #[serde(flatten)]
    pub status: SessionStatus,
    pub position_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::NotFound(_) | StoreError::RecordNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        e => {
            error!("Position store failure: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Positions
// ============================================================================

/// GET /positions
pub async fn list_positions(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.store.read().await;
    Json(store.list().to_vec())
}

/// POST /positions
pub async fn create_position(
    State(state): State<AppState>,
    Json(req): Json<NewPosition>,
) -> Response {
    if req.title.trim().is_empty() || req.company.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "title and company are required");
    }

    let mut store = state.store.write().await;
    match store.add(req) {
        Ok(position) => (StatusCode::CREATED, Json(position)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// GET /positions/:position_id
pub async fn get_position(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Response {
    let store = state.store.read().await;
    match store.get(&position_id) {
        Some(position) => (StatusCode::OK, Json(position.clone())).into_response(),
        None => store_error_response(StoreError::NotFound(position_id)),
    }
}

/// PATCH /positions/:position_id
/// Update interview date, logo or banner
pub async fn update_position(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
    Json(req): Json<PositionUpdate>,
) -> Response {
    let mut store = state.store.write().await;
    match store.update(&position_id, |position| req.apply(position)) {
        Ok(position) => (StatusCode::OK, Json(position.clone())).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /positions/:position_id
pub async fn delete_position(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Response {
    let mut store = state.store.write().await;
    match store.remove(&position_id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /positions/:position_id/research
/// Append a message to the research chat history
pub async fn append_research_message(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
    Json(message): Json<ChatMessage>,
) -> Response {
    let mut store = state.store.write().await;
    match store.append_research_message(&position_id, message.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /positions/:position_id/research
pub async fn clear_research_history(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Response {
    let mut store = state.store.write().await;
    match store.clear_research_history(&position_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /positions/:position_id/analysis
/// Record an analysis; the store assigns id and timestamp
pub async fn append_analysis_record(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
    Json(record): Json<AnalysisRecord>,
) -> Response {
    let mut store = state.store.write().await;
    match store.append_analysis_record(&position_id, record) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// DELETE /positions/:position_id/analysis/:record_id
pub async fn delete_analysis_record(
    State(state): State<AppState>,
    Path((position_id, record_id)): Path<(String, String)>,
) -> Response {
    let mut store = state.store.write().await;
    match store.remove_analysis_record(&position_id, &record_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => store_error_response(e),
    }
}

// ============================================================================
// Live interview
// ============================================================================

/// POST /positions/:position_id/interview/start
/// Start a live mock interview for a position
pub async fn start_interview(
    State(state): State<AppState>,
    Path(position_id): Path<String>,
) -> Response {
    let prompt = {
        let store = state.store.read().await;
        match store.get(&position_id) {
            Some(position) => interview_system_prompt(position),
            None => return store_error_response(StoreError::NotFound(position_id)),
        }
    };

    let Ok(_starting) = state.starting.try_lock() else {
        return error_response(StatusCode::CONFLICT, LiveError::AlreadyActive.to_string());
    };

    if !state.controller.state().is_idle() {
        return error_response(StatusCode::CONFLICT, LiveError::AlreadyActive.to_string());
    }

    // A session that ended on its own still holds an unsaved report
    if let Some(report) = state.controller.take_report().await {
        if let Err(e) = state.persist_report(report).await {
            error!("Failed to save previous interview: {}", e);
        }
    }

    info!("Starting interview for position {}", position_id);

    // Set before starting so a stop during connect already sees it
    *state.active_position.lock().await = Some(position_id.clone());

    match state.controller.start(prompt).await {
        Ok(session_id) => {
            if state.controller.state().is_idle() {
                // Cancelled while connecting, or already over
                match state.controller.take_report().await {
                    Some(report) => {
                        if let Err(e) = state.persist_report(report).await {
                            error!("Failed to save interview: {}", e);
                        }
                    }
                    None => {
                        state.active_position.lock().await.take();
                    }
                }
            }
            (
                StatusCode::OK,
                Json(StartInterviewResponse {
                    session_id,
                    position_id,
                    state: state.controller.state(),
                }),
            )
                .into_response()
        }
        Err(LiveError::AlreadyActive) => {
            state.active_position.lock().await.take();
            error_response(StatusCode::CONFLICT, LiveError::AlreadyActive.to_string())
        }
        Err(e) => {
            state.active_position.lock().await.take();
            let message = state
                .controller
                .error_message()
                .await
                .unwrap_or_else(|| e.to_string());
            error_response(StatusCode::BAD_GATEWAY, message)
        }
    }
}

/// POST /interview/stop
/// Stop the live interview and save its transcript
pub async fn stop_interview(State(state): State<AppState>) -> Response {
    let report = state.controller.stop().await;

    let mut saved = false;
    if let Some(report) = report.clone() {
        match state.persist_report(report).await {
            Ok(written) => saved = written,
            Err(e) => return store_error_response(e),
        }
    }

    let status = state.controller.status().await;
    let transcript = match report {
        Some(report) => report.turns,
        None => state.controller.transcript().await,
    };

    (
        StatusCode::OK,
        Json(StopInterviewResponse {
            state: status.state,
            session_id: status.session_id,
            transcript,
            error: status.error,
            saved,
        }),
    )
        .into_response()
}

/// GET /interview/status
pub async fn interview_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.controller.status().await;
    let position_id = state.active_position.lock().await.clone();

    Json(InterviewStatusResponse {
        status,
        position_id,
    })
}

/// GET /interview/transcript
/// Transcript accumulated so far (or of the last session)
pub async fn interview_transcript(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.transcript().await)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
