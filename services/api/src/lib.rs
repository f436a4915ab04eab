//! Coaching Simulation API Library Crate
//!
//! HTTP boundary for the coaching simulation: configuration, the in-memory session
//! registry, API handlers and routing. The `api` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod sessions;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
