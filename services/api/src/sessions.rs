//! In-Memory Session Registry
//!
//! Sessions live only as long as the process. Each one is an independently owned
//! `CoachingSession` behind its own mutex. The mutex is held for the synchronous engine
//! steps and released while the model is working, so a reset or a snapshot never waits on
//! the model, and a second submission is rejected by the engine instead of queueing.
//!
//! A manager turn runs on its own task. If the HTTP request goes away mid-turn the reply
//! is still applied, and the session never stays stuck waiting for it.

use coachsim_core::{
    ModelGateway, ParsedAssistantTurn, Phase, Scenario, SimulationError,
    simulation::{ActionPlanStep, CoachingSession},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, info, instrument, warn};
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<CoachingSession>>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh session in the intro phase.
    pub async fn create(&self, scenario: Arc<Scenario>) -> (Uuid, SessionHandle) {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(CoachingSession::new(scenario)));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, handle.clone());
        info!(session_id = %id, active_sessions = sessions.len(), "Session created");
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session removed");
        }
        removed
    }
}

/// The persona's reply together with the session state it produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub parsed: ParsedAssistantTurn,
    pub phase: Phase,
    pub turn_count: usize,
}

enum TurnRequest {
    Submit(String),
    Retry,
}

/// Runs one manager turn without holding the session lock across the model call.
#[instrument(skip_all)]
pub async fn submit_turn(
    session: SessionHandle,
    gateway: Arc<dyn ModelGateway>,
    text: String,
) -> Result<TurnReport, SimulationError> {
    run_turn(session, gateway, TurnRequest::Submit(text)).await
}

/// Asks the model again for a manager turn whose reply failed.
#[instrument(skip_all)]
pub async fn retry_turn(
    session: SessionHandle,
    gateway: Arc<dyn ModelGateway>,
) -> Result<TurnReport, SimulationError> {
    run_turn(session, gateway, TurnRequest::Retry).await
}

async fn run_turn(
    session: SessionHandle,
    gateway: Arc<dyn ModelGateway>,
    request: TurnRequest,
) -> Result<TurnReport, SimulationError> {
    let pending = {
        let mut guard = session.lock().await;
        match request {
            TurnRequest::Submit(text) => guard.begin_turn(text)?,
            TurnRequest::Retry => guard.begin_retry()?,
        }
    };

    let task = tokio::spawn(
        async move {
            let reply = gateway.invoke(pending.messages()).await;
            let mut guard = session.lock().await;
            let parsed = guard.complete_turn(pending, reply)?;
            Ok::<_, SimulationError>(TurnReport {
                parsed,
                phase: guard.phase(),
                turn_count: guard.turn_count(),
            })
        }
        .in_current_span(),
    );

    match task.await {
        Ok(report) => report,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            warn!(error = %e, "Manager turn task was cancelled");
            Err(SimulationError::Abandoned)
        }
    }
}

/// Returns the cached action plan or asks the model for one.
#[instrument(skip_all)]
pub async fn action_plan(
    session: &SessionHandle,
    gateway: &dyn ModelGateway,
) -> Result<String, SimulationError> {
    let step = session.lock().await.begin_action_plan()?;
    match step {
        ActionPlanStep::Ready(plan) => Ok(plan),
        ActionPlanStep::Request(pending) => {
            let plan = gateway.invoke(pending.messages()).await;
            session.lock().await.complete_action_plan(pending, plan)
        }
    }
}
