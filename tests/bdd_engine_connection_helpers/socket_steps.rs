//! Socket resolution step definitions.
//!
//! The resolver reads a [`MockEnv`] built from the scenario's variables, so
//! the host environment never leaks in.

use std::collections::HashMap;

use liveswap::engine::{EngineConnector, SocketResolver};
use mockable::MockEnv;
use rstest_bdd_macros::{given, then, when};

use super::{EngineConnectionState, StepResult};

fn export(state: &EngineConnectionState, name: String, value: String) {
    let mut environment = state.environment.get().unwrap_or_default();
    environment.insert(name, value);
    state.environment.set(environment);
}

fn mock_env(environment: HashMap<String, String>) -> MockEnv {
    let mut env = MockEnv::new();
    env.expect_string()
        .returning(move |name| environment.get(name).cloned());
    env
}

#[given("an empty environment")]
pub fn an_empty_environment(engine_connection_state: &EngineConnectionState) {
    engine_connection_state.environment.set(HashMap::new());
}

#[given("configuration names the engine socket {socket}")]
pub fn configuration_names_socket(engine_connection_state: &EngineConnectionState, socket: String) {
    engine_connection_state.configured_socket.set(socket);
}

#[given("the environment sets {name} to {value}")]
pub fn environment_sets(
    engine_connection_state: &EngineConnectionState,
    name: String,
    value: String,
) {
    export(engine_connection_state, name, value);
}

#[given("the environment leaves {name} blank")]
pub fn environment_leaves_blank(engine_connection_state: &EngineConnectionState, name: String) {
    export(engine_connection_state, name, String::new());
}

#[when("the engine socket is resolved")]
pub fn engine_socket_is_resolved(engine_connection_state: &EngineConnectionState) {
    let env = mock_env(engine_connection_state.environment.get().unwrap_or_default());
    let resolver = SocketResolver::new(&env);
    let configured = engine_connection_state.configured_socket.get();
    let chosen = EngineConnector::resolve_socket(configured.as_deref(), &resolver);
    engine_connection_state.chosen_socket.set(chosen);
}

#[then("the chosen socket is {expected}")]
pub fn chosen_socket_is(
    engine_connection_state: &EngineConnectionState,
    expected: String,
) -> StepResult<()> {
    let chosen = engine_connection_state
        .chosen_socket
        .get()
        .ok_or("no socket was resolved")?;
    assert_eq!(chosen, expected);
    Ok(())
}

#[then("the platform default socket is chosen")]
pub fn platform_default_is_chosen(
    engine_connection_state: &EngineConnectionState,
) -> StepResult<()> {
    let chosen = engine_connection_state
        .chosen_socket
        .get()
        .ok_or("no socket was resolved")?;
    assert_eq!(chosen, SocketResolver::<MockEnv>::default_socket());
    Ok(())
}
