//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ActionPlanResponse, ErrorResponse, FeedbackKind, FeedbackView, PhaseView, ScenarioInfo,
        SessionSnapshot, SubmitTurnPayload, TurnOutcome, TurnRole, TurnView,
    },
    state::AppState,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_scenario,
        handlers::create_session,
        handlers::get_session,
        handlers::start_session,
        handlers::submit_turn,
        handlers::retry_turn,
        handlers::generate_action_plan,
        handlers::reset_session,
        handlers::delete_session,
    ),
    components(
        schemas(
            ScenarioInfo, SessionSnapshot, TurnView, TurnRole, FeedbackView, FeedbackKind,
            PhaseView, SubmitTurnPayload, TurnOutcome, ActionPlanResponse, ErrorResponse
        )
    ),
    tags(
        (name = "Coaching Simulation API", description = "Turn-bounded coaching dialogues with a simulated employee")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/scenario", get(handlers::get_scenario))
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/{id}/start", post(handlers::start_session))
        .route("/sessions/{id}/turns", post(handlers::submit_turn))
        .route("/sessions/{id}/turns/retry", post(handlers::retry_turn))
        .route(
            "/sessions/{id}/action-plan",
            post(handlers::generate_action_plan),
        )
        .route("/sessions/{id}/reset", post(handlers::reset_session))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
