//! Axum Handlers for the REST API
//!
//! Each handler is one call into the simulation engine. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use coachsim_core::SimulationError;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    models::{
        ActionPlanResponse, ErrorResponse, ScenarioInfo, SessionSnapshot, SubmitTurnPayload,
        TurnOutcome,
    },
    sessions::{self, SessionHandle},
    state::AppState,
};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => message,
            ApiError::BadGateway(message) => {
                warn!("Model gateway error: {}", message);
                message
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::InvalidPhaseTransition { .. }
            | SimulationError::SubmissionInProgress
            | SimulationError::Abandoned
            | SimulationError::NothingToRetry => ApiError::Conflict(err.to_string()),
            SimulationError::ModelInvocation(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}

async fn find_session(state: &AppState, id: Uuid) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Session with id '{}' not found", id)))
}

async fn snapshot(id: Uuid, session: &SessionHandle) -> Json<SessionSnapshot> {
    Json(SessionSnapshot::new(id, &*session.lock().await))
}

/// Describe the training scenario shown before the simulation starts.
#[utoipa::path(
    get,
    path = "/scenario",
    responses(
        (status = 200, description = "Scenario briefing", body = ScenarioInfo)
    )
)]
pub async fn get_scenario(State(state): State<Arc<AppState>>) -> Json<ScenarioInfo> {
    Json(ScenarioInfo {
        title: state.scenario.title.clone(),
        intro: state.scenario.intro.clone(),
        persona_name: state.scenario.persona_name.clone(),
        max_transcript_len: state.scenario.transcript_limit,
    })
}

/// Create a new coaching simulation in the intro phase.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created successfully", body = SessionSnapshot)
    )
)]
pub async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (id, session) = state.sessions.create(state.scenario.clone()).await;
    (StatusCode::CREATED, snapshot(id, &session).await)
}

/// Get the phase, turn count and transcript of a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    responses(
        (status = 200, description = "Session details", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    Ok(snapshot(id, &session).await)
}

/// Leave the intro and begin the dialogue.
#[utoipa::path(
    post,
    path = "/sessions/{id}/start",
    responses(
        (status = 200, description = "Simulation started", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session is not in the intro phase", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut guard = session.lock().await;
    guard.start()?;
    info!(session_id = %id, "Simulation started via API");
    Ok(Json(SessionSnapshot::new(id, &guard)))
}

/// Submit the manager's next coaching message and get the persona's reply.
#[utoipa::path(
    post,
    path = "/sessions/{id}/turns",
    request_body = SubmitTurnPayload,
    responses(
        (status = 200, description = "Persona reply with feedback", body = TurnOutcome),
        (status = 400, description = "Empty message", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in progress, or a turn is already pending", body = ErrorResponse),
        (status = 502, description = "The model failed to reply", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn submit_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitTurnPayload>,
) -> Result<Json<TurnOutcome>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    let session = find_session(&state, id).await?;
    let report = sessions::submit_turn(session, state.gateway.clone(), payload.text).await?;
    Ok(Json(report.into()))
}

/// Ask the persona again to answer a manager message whose reply failed.
#[utoipa::path(
    post,
    path = "/sessions/{id}/turns/retry",
    responses(
        (status = 200, description = "Persona reply with feedback", body = TurnOutcome),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "No unanswered message, or a turn is already pending", body = ErrorResponse),
        (status = 502, description = "The model failed to reply", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn retry_turn(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let session = find_session(&state, id).await?;
    let report = sessions::retry_turn(session, state.gateway.clone()).await?;
    Ok(Json(report.into()))
}

/// Generate (or return the already generated) action plan for a concluded dialogue.
#[utoipa::path(
    post,
    path = "/sessions/{id}/action-plan",
    responses(
        (status = 200, description = "Action plan", body = ActionPlanResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Dialogue has not concluded", body = ErrorResponse),
        (status = 502, description = "The model failed to reply", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn generate_action_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionPlanResponse>, ApiError> {
    let session = find_session(&state, id).await?;
    let action_plan = sessions::action_plan(&session, state.gateway.as_ref()).await?;
    Ok(Json(ActionPlanResponse { action_plan }))
}

/// Start over with a fresh simulation under the same session ID.
#[utoipa::path(
    post,
    path = "/sessions/{id}/reset",
    responses(
        (status = 200, description = "Session reset to the intro phase", body = SessionSnapshot),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut guard = session.lock().await;
    guard.reset();
    Ok(Json(SessionSnapshot::new(id, &guard)))
}

/// Discard a session.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Session not found", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Session ID")
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session with id '{}' not found", id)))
    }
}
