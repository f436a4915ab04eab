//! Coaching simulation engine.
//!
//! A manager practises coaching against a language-model persona. Each persona reply
//! carries graded feedback, and once the dialogue concludes the transcript is turned into
//! an action plan. [`simulation::CoachingSession`] is the entry point; the model itself
//! sits behind [`gateway::ModelGateway`].

pub mod config;
pub mod feedback;
pub mod gateway;
pub mod message;
pub mod prompt;
pub mod scenario;
pub mod simulation;

pub use feedback::{Feedback, FeedbackCategory, ParsedAssistantTurn, parse_assistant_turn};
pub use gateway::{ChatMessage, ChatRole, ModelGateway, ModelInvocationError};
pub use message::{Role, Transcript, Turn};
pub use scenario::Scenario;
pub use simulation::{CoachingSession, Phase, SimulationError};
