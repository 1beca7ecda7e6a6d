//! Scenario state for update-mode behavioural tests.

use liveswap::cluster::ClusterEnv;
use liveswap::mode::ResolvedUpdateMode;
use liveswap::runtime::ContainerRuntime;
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

/// What resolution produced.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    /// A concrete mode.
    Resolved(ResolvedUpdateMode),
    /// The request cannot work in this environment.
    Unsatisfiable { requested: String },
    /// Any other error.
    Failed(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct UpdateModeState {
    pub(crate) env: Slot<ClusterEnv>,
    pub(crate) cluster_runtime: Slot<ContainerRuntime>,
    pub(crate) daemon_reachable: Slot<bool>,
    pub(crate) sidecar_available: Slot<bool>,
    pub(crate) resolution: Slot<Resolution>,
}

#[fixture]
pub(crate) fn update_mode_state() -> UpdateModeState {
    let state = UpdateModeState::default();
    state.env.set(ClusterEnv::None);
    state.daemon_reachable.set(false);
    state.sidecar_available.set(false);
    state
}
