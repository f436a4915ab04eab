//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the session registry and the
//! services every handler needs.

use crate::sessions::SessionStore;
use coachsim_core::{ModelGateway, Scenario};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub gateway: Arc<dyn ModelGateway>,
    pub scenario: Arc<Scenario>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>, scenario: Arc<Scenario>) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            gateway,
            scenario,
        }
    }
}
