use async_trait::async_trait;
use coachsim_core::{ChatMessage, ModelGateway, ModelInvocationError};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

/// Replays canned model results in order. Optionally holds each call until released.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<String, ModelInvocationError>>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<Result<String, ModelInvocationError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn invoke(&self, _messages: &[ChatMessage]) -> Result<String, ModelInvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelInvocationError::Request("no scripted reply".into())))
    }
}
