//! Health check step definitions for BDD tests.
//!
//! The daemon is a scripted [`ContainerLifecycle`] double, so these
//! scenarios run without a container engine on the host.

use std::time::Duration;

use bollard::errors::Error as BollardError;
use liveswap::engine::{
    ContainerLifecycle, EngineConnector, InspectContainerFuture, PingFuture,
    RestartContainerFuture,
};
use liveswap::error::{ContainerError, LiveswapError};
use rstest_bdd_macros::{given, then, when};

use super::{EngineConnectionState, HealthCheckOutcome, PingBehaviour, StepResult};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(50);

struct ScriptedDaemon {
    ping: PingBehaviour,
}

impl ContainerLifecycle for ScriptedDaemon {
    fn ping(&self) -> PingFuture<'_> {
        match self.ping {
            PingBehaviour::Answers => Box::pin(async { Ok(()) }),
            PingBehaviour::Rejects => Box::pin(async {
                Err(BollardError::DockerResponseServerError {
                    status_code: 500,
                    message: String::from("daemon is shutting down"),
                })
            }),
            PingBehaviour::Hangs => Box::pin(std::future::pending()),
        }
    }

    fn inspect_container(&self, _container_id: &str) -> InspectContainerFuture<'_> {
        Box::pin(async { Ok(bollard::models::ContainerInspectResponse::default()) })
    }

    fn restart_container(&self, _container_id: &str) -> RestartContainerFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

fn set_ping(state: &EngineConnectionState, ping: PingBehaviour) {
    state.ping.set(ping);
}

// =============================================================================
// Given step definitions
// =============================================================================

#[given("a daemon that answers pings")]
pub fn daemon_answers_pings(engine_connection_state: &EngineConnectionState) {
    set_ping(engine_connection_state, PingBehaviour::Answers);
}

#[given("a daemon that rejects pings")]
pub fn daemon_rejects_pings(engine_connection_state: &EngineConnectionState) {
    set_ping(engine_connection_state, PingBehaviour::Rejects);
}

#[given("a daemon that never answers")]
pub fn daemon_never_answers(engine_connection_state: &EngineConnectionState) {
    set_ping(engine_connection_state, PingBehaviour::Hangs);
}

// =============================================================================
// When step definitions
// =============================================================================

#[when("a health check is performed")]
pub fn health_check_is_performed(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let ping = engine_connection_state
        .ping
        .get()
        .ok_or("ping behaviour should be set")?;
    let daemon = ScriptedDaemon { ping };

    let outcome = match EngineConnector::health_check(&daemon, HEALTH_CHECK_TIMEOUT) {
        Ok(()) => HealthCheckOutcome::Success,
        Err(LiveswapError::Container(ContainerError::HealthCheckTimeout { .. })) => {
            HealthCheckOutcome::Timeout
        }
        Err(e) => HealthCheckOutcome::Failed(e.to_string()),
    };
    engine_connection_state.health_check_outcome.set(outcome);
    Ok(())
}

// =============================================================================
// Then step definitions
// =============================================================================

#[then("the health check succeeds")]
pub fn health_check_succeeds(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let outcome = engine_connection_state
        .health_check_outcome
        .get()
        .ok_or("health check outcome should be set")?;

    match outcome {
        HealthCheckOutcome::Success => Ok(()),
        HealthCheckOutcome::Failed(_) => Err("Expected health check to succeed, but it failed"),
        HealthCheckOutcome::Timeout => Err("Expected health check to succeed, but it timed out"),
    }
}

#[then("the health check fails with a daemon error")]
pub fn health_check_fails(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let outcome = engine_connection_state
        .health_check_outcome
        .get()
        .ok_or("health check outcome should be set")?;

    match outcome {
        HealthCheckOutcome::Failed(message) if message.contains("daemon is shutting down") => {
            Ok(())
        }
        HealthCheckOutcome::Failed(_) => Err("Expected the daemon's message in the failure"),
        HealthCheckOutcome::Success => Err("Expected health check to fail, but it succeeded"),
        HealthCheckOutcome::Timeout => Err("Expected a failure, but the health check timed out"),
    }
}

#[then("the health check times out")]
pub fn health_check_times_out(engine_connection_state: &EngineConnectionState) -> StepResult<()> {
    let outcome = engine_connection_state
        .health_check_outcome
        .get()
        .ok_or("health check outcome should be set")?;

    match outcome {
        HealthCheckOutcome::Timeout => Ok(()),
        HealthCheckOutcome::Success => Err("Expected health check to timeout, but it succeeded"),
        HealthCheckOutcome::Failed(_) => Err("Expected timeout error, but got a different failure"),
    }
}
