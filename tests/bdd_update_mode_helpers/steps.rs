//! Given/when steps for update-mode scenarios.

use liveswap::cluster::ClusterEnv;
use liveswap::error::{ConfigError, LiveswapError};
use liveswap::mode::{UpdateMode, resolve_update_mode};
use liveswap::runtime::{ContainerRuntime, RuntimeCapabilities};
use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::state::{Resolution, UpdateModeState};

#[given("no cluster context is active")]
fn no_cluster_context(update_mode_state: &UpdateModeState) {
    update_mode_state.env.set(ClusterEnv::None);
}

#[given("the cluster context is {context}")]
fn cluster_context_is(update_mode_state: &UpdateModeState, context: String) {
    update_mode_state
        .env
        .set(ClusterEnv::from_context(Some(&context)));
}

#[given("the node runtime is {version}")]
fn node_runtime_is(update_mode_state: &UpdateModeState, version: String) {
    update_mode_state
        .cluster_runtime
        .set(ContainerRuntime::from_runtime_version(&version));
}

#[given("the local daemon is reachable")]
fn daemon_is_reachable(update_mode_state: &UpdateModeState) {
    update_mode_state.daemon_reachable.set(true);
}

#[given("a sidecar connector is available")]
fn sidecar_is_available(update_mode_state: &UpdateModeState) {
    update_mode_state.sidecar_available.set(true);
}

#[when("the {mode} update mode is resolved")]
fn update_mode_is_resolved(update_mode_state: &UpdateModeState, mode: String) -> StepResult<()> {
    let requested = mode.parse::<UpdateMode>()?;
    let env = update_mode_state
        .env
        .get()
        .ok_or_else(|| String::from("environment should be set"))?;
    let capabilities = RuntimeCapabilities::new(
        update_mode_state.cluster_runtime.get(),
        update_mode_state.daemon_reachable.get().unwrap_or(false),
        update_mode_state.sidecar_available.get().unwrap_or(false),
    );

    let resolution = match resolve_update_mode(requested, env, &capabilities) {
        Ok(resolved) => Resolution::Resolved(resolved),
        Err(LiveswapError::Config(ConfigError::UnsatisfiableUpdateMode { requested, .. })) => {
            Resolution::Unsatisfiable {
                requested: requested.to_string(),
            }
        }
        Err(e) => Resolution::Failed(e.to_string()),
    };
    update_mode_state.resolution.set(resolution);
    Ok(())
}
