//! Behavioural test helpers for the container daemon connection.

mod health_check_steps;
mod socket_steps;

use std::collections::HashMap;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub use health_check_steps::*;
#[expect(
    unused_imports,
    reason = "rstest-bdd discovers step functions via attributes, not runtime usage"
)]
pub use socket_steps::*;

/// Step result type for BDD tests, using a static string for errors.
pub type StepResult<T> = Result<T, &'static str>;

/// How the scripted daemon answers a ping.
#[derive(Clone, Copy)]
pub enum PingBehaviour {
    /// The ping succeeds immediately.
    Answers,
    /// The daemon rejects the ping with a server error.
    Rejects,
    /// The ping never completes.
    Hangs,
}

/// Represents the outcome of a health check operation.
#[derive(Clone)]
pub enum HealthCheckOutcome {
    /// Health check succeeded.
    Success,
    /// Health check failed with an error message.
    Failed(String),
    /// Health check timed out.
    Timeout,
}

/// State shared across engine connection scenarios.
#[derive(Default, ScenarioState)]
pub struct EngineConnectionState {
    /// Variables visible to the socket resolver.
    pub environment: Slot<HashMap<String, String>>,
    /// Socket named by configuration, if any.
    pub configured_socket: Slot<String>,
    /// Socket picked by the resolver.
    pub chosen_socket: Slot<String>,
    /// How the daemon answers pings.
    pub ping: Slot<PingBehaviour>,
    /// The result of a health check operation.
    pub health_check_outcome: Slot<HealthCheckOutcome>,
}

/// Fixture providing a fresh engine connection state.
#[fixture]
pub fn engine_connection_state() -> EngineConnectionState {
    EngineConnectionState::default()
}
