//! API Models
//!
//! Request and response bodies for the REST API, with `utoipa` schemas for the OpenAPI
//! document. Engine types are mapped into these views so the wire format stays stable
//! independently of the core crate.

use coachsim_core::{
    Feedback, FeedbackCategory, Phase, Role, Turn, parse_assistant_turn,
    simulation::CoachingSession,
};
use crate::sessions::TurnReport;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseView {
    Intro,
    InProgress,
    ActionPlanReady,
}

impl From<Phase> for PhaseView {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Intro => PhaseView::Intro,
            Phase::InProgress => PhaseView::InProgress,
            Phase::ActionPlanReady => PhaseView::ActionPlanReady,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    GoodCoaching,
    PoorCoaching,
    NeedsImprovement,
}

impl From<FeedbackCategory> for FeedbackKind {
    fn from(category: FeedbackCategory) -> Self {
        match category {
            FeedbackCategory::GoodCoaching => FeedbackKind::GoodCoaching,
            FeedbackCategory::PoorCoaching => FeedbackKind::PoorCoaching,
            FeedbackCategory::NeedsImprovement => FeedbackKind::NeedsImprovement,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct FeedbackView {
    pub category: FeedbackKind,
    #[schema(example = "Good Coaching")]
    pub label: String,
    #[schema(example = "Good Coaching. You've validated their feelings.")]
    pub text: String,
}

impl From<Feedback> for FeedbackView {
    fn from(feedback: Feedback) -> Self {
        Self {
            category: feedback.category.into(),
            label: feedback.category.label().to_string(),
            text: feedback.text,
        }
    }
}

/// A transcript entry. Assistant turns also carry the parsed reply and feedback.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct TurnView {
    pub role: TurnRole,
    /// Raw text as stored in the transcript.
    pub text: String,
    pub persona_reply: Option<String>,
    pub feedback: Option<FeedbackView>,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        match turn.role() {
            Role::User => Self {
                role: TurnRole::User,
                text: turn.text().to_string(),
                persona_reply: None,
                feedback: None,
            },
            Role::Assistant => {
                let parsed = parse_assistant_turn(turn.text());
                Self {
                    role: TurnRole::Assistant,
                    text: turn.text().to_string(),
                    persona_reply: Some(parsed.persona_reply),
                    feedback: parsed.feedback.map(FeedbackView::from),
                }
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SessionSnapshot {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub phase: PhaseView,
    pub turn_count: usize,
    pub transcript: Vec<TurnView>,
    pub action_plan: Option<String>,
}

impl SessionSnapshot {
    pub fn new(id: Uuid, session: &CoachingSession) -> Self {
        Self {
            id,
            phase: session.phase().into(),
            turn_count: session.turn_count(),
            transcript: session.transcript().iter().map(TurnView::from).collect(),
            action_plan: session.action_plan().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ScenarioInfo {
    #[schema(example = "PAR Reduction Training Module")]
    pub title: String,
    pub intro: String,
    #[schema(example = "Alex")]
    pub persona_name: String,
    pub max_transcript_len: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitTurnPayload {
    #[schema(example = "How are the collection calls going this week?")]
    pub text: String,
}

/// The persona's answer to one manager turn.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct TurnOutcome {
    pub persona_reply: String,
    pub feedback: Option<FeedbackView>,
    pub phase: PhaseView,
    pub turn_count: usize,
}

impl From<TurnReport> for TurnOutcome {
    fn from(report: TurnReport) -> Self {
        Self {
            persona_reply: report.parsed.persona_reply,
            feedback: report.parsed.feedback.map(FeedbackView::from),
            phase: report.phase.into(),
            turn_count: report.turn_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ActionPlanResponse {
    #[schema(example = "- Schedule a weekly call review\n- Role-play difficult calls")]
    pub action_plan: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
