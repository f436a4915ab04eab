//! Request assembly for the two kinds of model call a simulation makes.
//!
//! Both builders are pure: all state lives in the transcript passed in, and exemplars are
//! re-supplied on every call rather than stored.

use crate::{
    gateway::ChatMessage,
    message::Transcript,
    scenario::{Exemplar, Scenario},
};

/// `[system] ++ exemplar pairs ++ transcript`, for the persona's next reply.
pub fn conversation_request(
    system_prompt: &str,
    exemplars: &[Exemplar],
    transcript: &Transcript,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(1 + exemplars.len() * 2 + transcript.len());
    messages.push(ChatMessage::system(system_prompt));
    for exemplar in exemplars {
        messages.push(ChatMessage::user(exemplar.manager.as_str()));
        messages.push(ChatMessage::assistant(exemplar.persona.as_str()));
    }
    messages.extend(transcript.iter().map(ChatMessage::from));
    messages
}

/// `[system] ++ transcript`, for the closing action plan. No exemplars.
pub fn action_plan_request(system_prompt: &str, transcript: &Transcript) -> Vec<ChatMessage> {
    std::iter::once(ChatMessage::system(system_prompt))
        .chain(transcript.iter().map(ChatMessage::from))
        .collect()
}

impl Scenario {
    pub fn conversation_request(&self, transcript: &Transcript) -> Vec<ChatMessage> {
        conversation_request(&self.persona_prompt, &self.exemplars, transcript)
    }

    pub fn action_plan_request(&self, transcript: &Transcript) -> Vec<ChatMessage> {
        action_plan_request(&self.action_plan_prompt, transcript)
    }
}
