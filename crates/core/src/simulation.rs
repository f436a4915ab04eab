//! Simulation Engine
//!
//! This module owns the lifecycle of one coaching simulation: the phase, the transcript
//! and the turn count, and the rules for moving between phases. Boundaries (the API
//! service, the terminal client) drive it through [`CoachingSession`] and only render
//! what it returns.
//!
//! A manager turn is split into two synchronous steps around the model call,
//! [`CoachingSession::begin_turn`] and [`CoachingSession::complete_turn`], so a caller can
//! release its lock on the session while the model is working. While a turn is in flight
//! further submissions are rejected. A reset bumps the session's epoch, and a late reply
//! from before the reset is dropped instead of landing in the fresh transcript.
//!
//! A turn whose reply never arrives (the caller stopped waiting, or the model failed)
//! leaves the manager's message at the end of the transcript. [`CoachingSession::begin_retry`]
//! asks the model again for that message without recording it twice.

use crate::{
    feedback::{ParsedAssistantTurn, parse_assistant_turn},
    gateway::{ChatMessage, ModelGateway, ModelInvocationError},
    message::{Role, Transcript, Turn},
    scenario::Scenario,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Briefing shown, dialogue not yet begun.
    Intro,
    /// Manager and persona are exchanging turns.
    InProgress,
    /// Dialogue finished; only the action plan and a reset remain.
    ActionPlanReady,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Intro => write!(f, "intro"),
            Phase::InProgress => write!(f, "in-progress"),
            Phase::ActionPlanReady => write!(f, "action-plan-ready"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("Cannot {operation} during the {phase} phase")]
    InvalidPhaseTransition {
        operation: &'static str,
        phase: Phase,
    },
    #[error("A manager turn is already waiting for the persona's reply")]
    SubmissionInProgress,
    #[error("The simulation was reset before the model replied")]
    Abandoned,
    #[error("There is no unanswered manager turn to retry")]
    NothingToRetry,
    #[error(transparent)]
    ModelInvocation(#[from] ModelInvocationError),
}

/// Everything that changes during one run. Recreated wholesale on reset.
#[derive(Debug, Clone)]
pub struct SimulationState {
    phase: Phase,
    transcript: Transcript,
    turn_count: usize,
    awaiting_reply: bool,
    action_plan: Option<String>,
}

impl SimulationState {
    fn new(opening_line: &str) -> Self {
        Self {
            phase: Phase::Intro,
            transcript: Transcript::seeded(opening_line),
            turn_count: 0,
            awaiting_reply: false,
            action_plan: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Persona replies produced since the opening line.
    pub fn turn_count(&self) -> usize {
        self.turn_count
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }
}

/// A manager turn that has been recorded and is waiting for the model's reply.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    epoch: u64,
    messages: Vec<ChatMessage>,
}

impl PendingTurn {
    /// The request to send to the model gateway.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// An action-plan request prepared while the session was in `ActionPlanReady`.
#[derive(Debug, Clone)]
pub struct PendingActionPlan {
    epoch: u64,
    messages: Vec<ChatMessage>,
}

impl PendingActionPlan {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Outcome of [`CoachingSession::begin_action_plan`].
#[derive(Debug, Clone)]
pub enum ActionPlanStep {
    /// The plan was generated earlier in this run.
    Ready(String),
    /// The model has to be asked.
    Request(PendingActionPlan),
}

/// One manager's coaching simulation.
pub struct CoachingSession {
    scenario: Arc<Scenario>,
    state: SimulationState,
    epoch: u64,
}

impl CoachingSession {
    pub fn new(scenario: Arc<Scenario>) -> Self {
        let state = SimulationState::new(&scenario.opening_line);
        Self {
            scenario,
            state,
            epoch: 0,
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn transcript(&self) -> &Transcript {
        &self.state.transcript
    }

    pub fn turn_count(&self) -> usize {
        self.state.turn_count
    }

    /// The action plan, if one has been generated this run.
    pub fn action_plan(&self) -> Option<&str> {
        self.state.action_plan.as_deref()
    }

    /// Moves from the briefing into the dialogue.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        self.require_phase(Phase::Intro, "start the simulation")?;
        self.state.phase = Phase::InProgress;
        info!(phase = %self.state.phase, "Simulation started");
        Ok(())
    }

    /// Records the manager's turn and prepares the persona request.
    ///
    /// The user turn stays in the transcript even if the model call later fails.
    pub fn begin_turn(&mut self, text: impl Into<String>) -> Result<PendingTurn, SimulationError> {
        self.require_phase(Phase::InProgress, "submit a manager turn")?;
        if self.state.awaiting_reply {
            return Err(SimulationError::SubmissionInProgress);
        }

        self.state.transcript.push(Turn::user(text));
        Ok(self.await_reply())
    }

    /// Prepares a new persona request for the manager turn that a failed or dropped call
    /// left unanswered.
    pub fn begin_retry(&mut self) -> Result<PendingTurn, SimulationError> {
        self.require_phase(Phase::InProgress, "retry a manager turn")?;
        if self.state.awaiting_reply {
            return Err(SimulationError::SubmissionInProgress);
        }
        if self.state.transcript.last().map(Turn::role) != Some(Role::User) {
            return Err(SimulationError::NothingToRetry);
        }
        Ok(self.await_reply())
    }

    fn await_reply(&mut self) -> PendingTurn {
        self.state.awaiting_reply = true;
        PendingTurn {
            epoch: self.epoch,
            messages: self.scenario.conversation_request(&self.state.transcript),
        }
    }

    /// Clears the in-flight flag of a turn whose reply will never be applied.
    fn release_turn(&mut self, epoch: u64) {
        if epoch == self.epoch && self.state.awaiting_reply {
            self.state.awaiting_reply = false;
            warn!(
                transcript_len = self.state.transcript.len(),
                "Manager turn dropped before the persona replied"
            );
        }
    }

    /// Applies the model's answer to a turn started with [`Self::begin_turn`].
    ///
    /// On success the raw reply is appended, the turn count bumped and the termination
    /// policy evaluated. On failure nothing but the in-flight flag changes.
    pub fn complete_turn(
        &mut self,
        pending: PendingTurn,
        reply: Result<String, ModelInvocationError>,
    ) -> Result<ParsedAssistantTurn, SimulationError> {
        if pending.epoch != self.epoch {
            warn!(
                pending_epoch = pending.epoch,
                epoch = self.epoch,
                "Dropping persona reply for a run that was reset"
            );
            return Err(SimulationError::Abandoned);
        }
        self.state.awaiting_reply = false;

        let reply = reply.and_then(|text| {
            if text.trim().is_empty() {
                Err(ModelInvocationError::EmptyResponse)
            } else {
                Ok(text)
            }
        });
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                let transcript_len = self.state.transcript.len();
                warn!(error = %e, transcript_len, "Persona reply failed");
                return Err(e.into());
            }
        };

        let parsed = parse_assistant_turn(&reply);
        let closing = self.scenario.is_closing_reply(&reply);
        self.state.transcript.push(Turn::assistant(reply));
        self.state.turn_count += 1;
        debug_assert_eq!(
            self.state.turn_count + 1,
            self.state.transcript.assistant_turns()
        );

        let limit_reached = self.state.transcript.len() >= self.scenario.transcript_limit;
        if closing || limit_reached {
            self.state.phase = Phase::ActionPlanReady;
            info!(
                turn_count = self.state.turn_count,
                transcript_len = self.state.transcript.len(),
                closing,
                limit_reached,
                "Dialogue concluded"
            );
        }

        Ok(parsed)
    }

    /// Submits a manager turn and waits for the persona's reply.
    #[instrument(skip_all, fields(turn = self.state.turn_count + 1))]
    pub async fn submit_manager_turn(
        &mut self,
        gateway: &dyn ModelGateway,
        text: impl Into<String>,
    ) -> Result<ParsedAssistantTurn, SimulationError> {
        let pending = self.begin_turn(text)?;
        self.await_persona(gateway, pending).await
    }

    /// Asks the persona again to answer the last, unanswered manager turn.
    #[instrument(skip_all, fields(turn = self.state.turn_count + 1))]
    pub async fn retry_manager_turn(
        &mut self,
        gateway: &dyn ModelGateway,
    ) -> Result<ParsedAssistantTurn, SimulationError> {
        let pending = self.begin_retry()?;
        self.await_persona(gateway, pending).await
    }

    async fn await_persona(
        &mut self,
        gateway: &dyn ModelGateway,
        pending: PendingTurn,
    ) -> Result<ParsedAssistantTurn, SimulationError> {
        let mut in_flight = InFlightTurn {
            session: self,
            epoch: pending.epoch,
            settled: false,
        };
        let reply = gateway.invoke(pending.messages()).await;
        in_flight.settled = true;
        in_flight.session.complete_turn(pending, reply)
    }

    /// Returns the cached plan or prepares the request for one.
    pub fn begin_action_plan(&self) -> Result<ActionPlanStep, SimulationError> {
        self.require_phase(Phase::ActionPlanReady, "generate an action plan")?;
        if let Some(plan) = &self.state.action_plan {
            return Ok(ActionPlanStep::Ready(plan.clone()));
        }
        Ok(ActionPlanStep::Request(PendingActionPlan {
            epoch: self.epoch,
            messages: self.scenario.action_plan_request(&self.state.transcript),
        }))
    }

    /// Stores the model's action plan. A failed generation caches nothing.
    pub fn complete_action_plan(
        &mut self,
        pending: PendingActionPlan,
        plan: Result<String, ModelInvocationError>,
    ) -> Result<String, SimulationError> {
        if pending.epoch != self.epoch {
            warn!("Dropping action plan for a run that was reset");
            return Err(SimulationError::Abandoned);
        }
        let plan = plan.inspect_err(|e| warn!(error = %e, "Action plan generation failed"))?;
        if plan.trim().is_empty() {
            return Err(ModelInvocationError::EmptyResponse.into());
        }
        info!(turn_count = self.state.turn_count, "Action plan generated");
        Ok(self.state.action_plan.get_or_insert(plan).clone())
    }

    /// Produces the closing action plan from the full transcript.
    #[instrument(skip_all)]
    pub async fn generate_action_plan(
        &mut self,
        gateway: &dyn ModelGateway,
    ) -> Result<String, SimulationError> {
        match self.begin_action_plan()? {
            ActionPlanStep::Ready(plan) => Ok(plan),
            ActionPlanStep::Request(pending) => {
                let plan = gateway.invoke(pending.messages()).await;
                self.complete_action_plan(pending, plan)
            }
        }
    }

    /// Discards the run and starts over at the briefing.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = SimulationState::new(&self.scenario.opening_line);
        info!(epoch = self.epoch, "Simulation reset");
    }

    fn require_phase(
        &self,
        expected: Phase,
        operation: &'static str,
    ) -> Result<(), SimulationError> {
        if self.state.phase == expected {
            Ok(())
        } else {
            Err(SimulationError::InvalidPhaseTransition {
                operation,
                phase: self.state.phase,
            })
        }
    }
}

/// Keeps a session borrowed while its turn waits on the model. If the wait is cancelled
/// before the reply is applied, the turn is released so the session accepts input again.
struct InFlightTurn<'a> {
    session: &'a mut CoachingSession,
    epoch: u64,
    settled: bool,
}

impl Drop for InFlightTurn<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.release_turn(self.epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feedback::FeedbackCategory,
        gateway::{ChatRole, MockModelGateway},
        message::Role,
    };
    use std::time::Duration;

    const ORDINARY: &str = "I can try that. Feedback: Needs Improvement. Be more specific.";

    fn session() -> CoachingSession {
        CoachingSession::new(Arc::new(Scenario::par90()))
    }

    fn started() -> CoachingSession {
        let mut session = session();
        session.start().unwrap();
        session
    }

    fn replying(reply: &'static str) -> MockModelGateway {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_invoke()
            .returning(move |_| Ok(reply.to_string()));
        gateway
    }

    fn failing() -> MockModelGateway {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_invoke()
            .returning(|_| Err(ModelInvocationError::Request("connection refused".into())));
        gateway
    }

    #[test]
    fn test_new_session_is_seeded_intro() {
        let session = session();
        assert_eq!(session.phase(), Phase::Intro);
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.transcript().len(), 1);
        let seed = &session.transcript().turns()[0];
        assert_eq!(seed.role(), Role::Assistant);
        assert_eq!(seed.text(), session.scenario().opening_line);
    }

    #[test]
    fn test_start_only_from_intro() {
        let mut session = session();
        session.start().unwrap();
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.transcript().len(), 1);

        let err = session.start().unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidPhaseTransition {
                operation: "start the simulation",
                phase: Phase::InProgress,
            }
        );
    }

    #[tokio::test]
    async fn test_submit_outside_in_progress_is_rejected_without_mutation() {
        let mut gateway = MockModelGateway::new();
        gateway.expect_invoke().never();

        let mut session = session();
        let err = session
            .submit_manager_turn(&gateway, "hello")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::InvalidPhaseTransition {
                phase: Phase::Intro,
                ..
            }
        ));
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.phase(), Phase::Intro);
    }

    #[tokio::test]
    async fn test_successful_turn_appends_user_and_raw_reply() {
        let gateway = replying("  That makes sense. Feedback: Good Coaching. Nice empathy. ");
        let mut session = started();

        let parsed = session
            .submit_manager_turn(&gateway, "How are you feeling about it?")
            .await
            .unwrap();

        assert_eq!(parsed.persona_reply, "That makes sense.");
        assert_eq!(parsed.category(), Some(FeedbackCategory::GoodCoaching));
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.turn_count(), 1);
        assert_eq!(session.phase(), Phase::InProgress);

        let turns = session.transcript().turns();
        assert_eq!(turns[1], Turn::user("How are you feeling about it?"));
        assert_eq!(
            turns[2],
            Turn::assistant("  That makes sense. Feedback: Good Coaching. Nice empathy. ")
        );
    }

    #[tokio::test]
    async fn test_request_carries_exemplars_then_transcript() {
        let scenario = Scenario::par90();
        let exemplar_messages = scenario.exemplars.len() * 2;
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_invoke()
            .withf(move |messages| {
                messages.len() == 1 + exemplar_messages + 2
                    && messages[0].role == ChatRole::System
                    && messages[messages.len() - 1] == ChatMessage::user("Let's talk.")
            })
            .times(1)
            .returning(|_| Ok(ORDINARY.to_string()));

        let mut session = started();
        session.submit_manager_turn(&gateway, "Let's talk.").await.unwrap();
        // Exemplars are never stored.
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_three_ordinary_turns_stay_in_progress_fourth_concludes() {
        let gateway = replying(ORDINARY);
        let mut session = started();

        for _ in 0..3 {
            session.submit_manager_turn(&gateway, "next").await.unwrap();
        }
        assert_eq!(session.transcript().len(), 7);
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.turn_count(), 3);

        session.submit_manager_turn(&gateway, "last").await.unwrap();
        assert_eq!(session.transcript().len(), 9);
        assert_eq!(session.turn_count(), 4);
        assert_eq!(session.phase(), Phase::ActionPlanReady);
    }

    #[test]
    fn test_failed_turn_does_not_evaluate_limit() {
        let mut session = started();
        for _ in 0..3 {
            let pending = session.begin_turn("next").unwrap();
            session
                .complete_turn(pending, Ok(ORDINARY.to_string()))
                .unwrap();
        }
        assert_eq!(session.transcript().len(), 7);
        assert_eq!(session.phase(), Phase::InProgress);

        // A failed reply leaves the user turn behind: length 8 but no evaluation happens.
        let pending = session.begin_turn("retry me").unwrap();
        session
            .complete_turn(pending, Err(ModelInvocationError::EmptyResponse))
            .unwrap_err();
        assert_eq!(session.transcript().len(), 8);
        assert_eq!(session.phase(), Phase::InProgress);

        let pending = session.begin_turn("again").unwrap();
        session
            .complete_turn(pending, Ok(ORDINARY.to_string()))
            .unwrap();
        assert_eq!(session.transcript().len(), 10);
        assert_eq!(session.phase(), Phase::ActionPlanReady);
    }

    #[test]
    fn test_limit_reached_exactly_at_eight() {
        let mut session = started();

        // A failed turn shifts parity so that a reply lands on exactly 8.
        let pending = session.begin_turn("a").unwrap();
        session
            .complete_turn(pending, Err(ModelInvocationError::EmptyResponse))
            .unwrap_err();
        for _ in 0..2 {
            let pending = session.begin_turn("b").unwrap();
            session
                .complete_turn(pending, Ok(ORDINARY.to_string()))
                .unwrap();
        }
        assert_eq!(session.transcript().len(), 6);
        assert_eq!(session.phase(), Phase::InProgress);

        let pending = session.begin_turn("c").unwrap();
        assert_eq!(session.transcript().len(), 7);
        session
            .complete_turn(pending, Ok(ORDINARY.to_string()))
            .unwrap();
        assert_eq!(session.transcript().len(), 8);
        assert_eq!(session.phase(), Phase::ActionPlanReady);
    }

    #[tokio::test]
    async fn test_closing_phrase_concludes_early() {
        let gateway = replying("GREAT, thanks for the help. Feedback: Good Coaching. Clear plan.");
        let mut session = started();

        session.submit_manager_turn(&gateway, "Here's the plan.").await.unwrap();
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.phase(), Phase::ActionPlanReady);
    }

    #[tokio::test]
    async fn test_closing_phrase_in_user_turn_does_not_conclude() {
        let gateway = replying(ORDINARY);
        let mut session = started();

        session
            .submit_manager_turn(&gateway, "Great, thanks for the help.")
            .await
            .unwrap();
        assert_eq!(session.phase(), Phase::InProgress);
    }

    #[tokio::test]
    async fn test_model_failure_keeps_user_turn_only() {
        let gateway = failing();
        let mut session = started();

        let err = session
            .submit_manager_turn(&gateway, "Anyone there?")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SimulationError::ModelInvocation(ModelInvocationError::Request(
                "connection refused".into()
            ))
        );
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript().last(), Some(&Turn::user("Anyone there?")));
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.phase(), Phase::InProgress);
        assert!(!session.state().awaiting_reply());

        // The caller can go again.
        let gateway = replying(ORDINARY);
        session.submit_manager_turn(&gateway, "Retry").await.unwrap();
        assert_eq!(session.transcript().len(), 4);
        assert_eq!(session.turn_count(), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_is_a_model_error() {
        let gateway = replying("   \n");
        let mut session = started();

        let err = session.submit_manager_turn(&gateway, "hi").await.unwrap_err();
        assert_eq!(
            err,
            SimulationError::ModelInvocation(ModelInvocationError::EmptyResponse)
        );
        assert_eq!(session.transcript().len(), 2);
    }

    #[test]
    fn test_second_submission_while_waiting_is_rejected() {
        let mut session = started();
        let pending = session.begin_turn("first").unwrap();

        assert_eq!(
            session.begin_turn("second").unwrap_err(),
            SimulationError::SubmissionInProgress
        );
        assert_eq!(session.transcript().len(), 2);

        session
            .complete_turn(pending, Ok(ORDINARY.to_string()))
            .unwrap();
        assert!(session.begin_turn("third").is_ok());
    }

    #[test]
    fn test_reset_abandons_outstanding_reply() {
        let mut session = started();
        let pending = session.begin_turn("hello").unwrap();

        session.reset();
        let err = session
            .complete_turn(pending, Ok(ORDINARY.to_string()))
            .unwrap_err();
        assert_eq!(err, SimulationError::Abandoned);
        assert_eq!(session.phase(), Phase::Intro);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.turn_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_from_every_phase() {
        let gateway = replying("Great, thanks for the help. Feedback: Good Coaching.");

        let mut session = session();
        session.reset();
        assert_eq!(session.phase(), Phase::Intro);

        session.start().unwrap();
        session.reset();
        assert_eq!(session.phase(), Phase::Intro);
        assert_eq!(session.transcript().len(), 1);

        session.start().unwrap();
        session.submit_manager_turn(&gateway, "plan").await.unwrap();
        session.generate_action_plan(&gateway).await.unwrap();
        assert_eq!(session.phase(), Phase::ActionPlanReady);
        session.reset();
        assert_eq!(session.phase(), Phase::Intro);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.turn_count(), 0);
        assert_eq!(session.action_plan(), None);
    }

    #[tokio::test]
    async fn test_action_plan_requires_concluded_dialogue() {
        let mut gateway = MockModelGateway::new();
        gateway.expect_invoke().never();

        let mut session = started();
        let err = session.generate_action_plan(&gateway).await.unwrap_err();
        assert!(matches!(
            err,
            SimulationError::InvalidPhaseTransition {
                phase: Phase::InProgress,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_action_plan_uses_transcript_without_exemplars_and_is_cached() {
        let closing = replying("Great, thanks for the help. Feedback: Good Coaching.");
        let mut session = started();
        session.submit_manager_turn(&closing, "Try calling earlier.").await.unwrap();

        let mut planner = MockModelGateway::new();
        planner
            .expect_invoke()
            .withf(|messages| {
                messages.len() == 4
                    && messages[0].role == ChatRole::System
                    && messages[0].content.contains("action plan")
                    && messages[2] == ChatMessage::user("Try calling earlier.")
            })
            .times(1)
            .returning(|_| Ok("- Call earlier in the day".to_string()));

        let plan = session.generate_action_plan(&planner).await.unwrap();
        assert_eq!(plan, "- Call earlier in the day");
        let again = session.generate_action_plan(&planner).await.unwrap();
        assert_eq!(again, plan);
        assert_eq!(session.action_plan(), Some("- Call earlier in the day"));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_action_plan_is_not_cached() {
        let closing = replying("Great, thanks for the help.");
        let mut session = started();
        session.submit_manager_turn(&closing, "ok").await.unwrap();

        let err = session.generate_action_plan(&failing()).await.unwrap_err();
        assert!(matches!(err, SimulationError::ModelInvocation(_)));
        assert_eq!(session.action_plan(), None);
        assert_eq!(session.phase(), Phase::ActionPlanReady);

        let plan = session
            .generate_action_plan(&replying("- Step one"))
            .await
            .unwrap();
        assert_eq!(plan, "- Step one");
    }

    struct Unresponsive;

    #[async_trait::async_trait]
    impl ModelGateway for Unresponsive {
        async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String, ModelInvocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_submission_releases_the_turn() {
        let mut session = started();

        let waited = tokio::time::timeout(
            Duration::from_millis(20),
            session.submit_manager_turn(&Unresponsive, "first"),
        )
        .await;
        assert!(waited.is_err());
        assert!(!session.state().awaiting_reply());
        assert_eq!(session.transcript().last(), Some(&Turn::user("first")));
        assert_eq!(session.phase(), Phase::InProgress);

        session
            .submit_manager_turn(&replying(ORDINARY), "second")
            .await
            .unwrap();
        assert_eq!(session.transcript().len(), 4);
        assert_eq!(session.turn_count(), 1);
    }

    #[test]
    fn test_release_after_reset_leaves_fresh_state_alone() {
        let mut session = started();
        let pending = session.begin_turn("stale").unwrap();
        session.reset();
        session.start().unwrap();
        let _fresh = session.begin_turn("fresh").unwrap();

        session.release_turn(pending.epoch);
        assert!(session.state().awaiting_reply());
    }

    #[tokio::test]
    async fn test_retry_answers_dangling_turn_without_duplicating_it() {
        let mut session = started();
        session
            .submit_manager_turn(&failing(), "Anyone there?")
            .await
            .unwrap_err();

        let mut gateway = MockModelGateway::new();
        gateway
            .expect_invoke()
            .withf(|messages| messages.last() == Some(&ChatMessage::user("Anyone there?")))
            .times(1)
            .returning(|_| Ok(ORDINARY.to_string()));
        let parsed = session.retry_manager_turn(&gateway).await.unwrap();

        assert_eq!(parsed.persona_reply, "I can try that.");
        let roles: Vec<_> = session.transcript().iter().map(Turn::role).collect();
        assert_eq!(roles, vec![Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(session.turn_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_after_cancelled_submission() {
        let mut session = started();
        let _ = tokio::time::timeout(
            Duration::from_millis(20),
            session.submit_manager_turn(&Unresponsive, "hello?"),
        )
        .await;

        session.retry_manager_turn(&replying(ORDINARY)).await.unwrap();
        assert_eq!(session.transcript().len(), 3);
    }

    #[test]
    fn test_retry_needs_an_unanswered_turn() {
        let mut session = session();
        assert!(matches!(
            session.begin_retry().unwrap_err(),
            SimulationError::InvalidPhaseTransition {
                phase: Phase::Intro,
                ..
            }
        ));

        session.start().unwrap();
        assert_eq!(
            session.begin_retry().unwrap_err(),
            SimulationError::NothingToRetry
        );

        let pending = session.begin_turn("first").unwrap();
        assert_eq!(
            session.begin_retry().unwrap_err(),
            SimulationError::SubmissionInProgress
        );
        session
            .complete_turn(pending, Ok(ORDINARY.to_string()))
            .unwrap();
        assert_eq!(
            session.begin_retry().unwrap_err(),
            SimulationError::NothingToRetry
        );
    }

    #[test]
    fn test_error_messages() {
        let err = SimulationError::InvalidPhaseTransition {
            operation: "submit a manager turn",
            phase: Phase::Intro,
        };
        assert_eq!(err.to_string(), "Cannot submit a manager turn during the intro phase");
        assert_eq!(
            SimulationError::from(ModelInvocationError::EmptyResponse).to_string(),
            "Model returned no usable content"
        );
    }
}
