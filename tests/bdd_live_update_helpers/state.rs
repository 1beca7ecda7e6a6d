//! Scenario state for live-update dispatch tests.

use std::sync::Arc;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

use super::doubles::{RecordingCluster, RecordingDeployer};

/// What dispatching the target produced.
#[derive(Debug, Clone)]
pub(crate) enum DispatchResult {
    /// A strategy built the target.
    Built { strategy: &'static str },
    /// The accepting strategy failed.
    Failed { strategy: &'static str },
    /// No strategy accepted the target.
    NoEligibleStrategy { tried: Vec<&'static str> },
    /// Any other error.
    Other(String),
}

#[derive(Default, ScenarioState)]
pub(crate) struct LiveUpdateState {
    pub(crate) cluster: Slot<Arc<RecordingCluster>>,
    pub(crate) deployer: Slot<Arc<RecordingDeployer>>,
    pub(crate) in_cluster: Slot<bool>,
    pub(crate) image_collaborators: Slot<bool>,
    pub(crate) deletes: Slot<Vec<String>>,
    pub(crate) copies_archive: Slot<bool>,
    pub(crate) commands: Slot<Vec<String>>,
    pub(crate) hot_reload: Slot<bool>,
    pub(crate) requires_rebuild: Slot<bool>,
    pub(crate) local_command: Slot<String>,
    pub(crate) result: Slot<DispatchResult>,
}

#[fixture]
pub(crate) fn live_update_state() -> LiveUpdateState {
    let state = LiveUpdateState::default();
    state.cluster.set(Arc::new(RecordingCluster::new()));
    state.deployer.set(Arc::new(RecordingDeployer::new()));
    state.in_cluster.set(false);
    state.image_collaborators.set(true);
    state.deletes.set(Vec::new());
    state.copies_archive.set(false);
    state.commands.set(Vec::new());
    state.hot_reload.set(true);
    state.requires_rebuild.set(false);
    state
}
