//! Given/when steps for live-update dispatch scenarios.

use std::sync::Arc;

use camino::Utf8PathBuf;
use liveswap::cluster::{ClusterClient, ClusterEnv};
use liveswap::config::AppConfig;
use liveswap::error::DispatchError;
use liveswap::model::{
    ContainerCommand, ContainerRef, Deploy, ImageBuildResult, ImageTarget, LiveUpdateDelta,
    LocalCommand, Manifest, RunningContainer, Target, TargetId,
};
use liveswap::session::{Collaborators, Session};
use liveswap::strategy::{ImageBuilder, ManifestApplier};
use rstest_bdd_macros::{given, when};
use tokio_util::sync::CancellationToken;

use super::StepResult;
use super::state::{DispatchResult, LiveUpdateState};

const RUNNING_IMAGE: &str = "web:v1";

fn missing(what: &str) -> String {
    format!("{what} should be set")
}

fn push_to(slot: &rstest_bdd::Slot<Vec<String>>, value: String) {
    let mut values = slot.get().unwrap_or_default();
    values.push(value);
    slot.set(values);
}

#[given("a kind cluster running web on containerd")]
fn kind_cluster(live_update_state: &LiveUpdateState) {
    live_update_state.in_cluster.set(true);
}

#[given("no cluster is in use")]
fn no_cluster(live_update_state: &LiveUpdateState) {
    live_update_state.in_cluster.set(false);
}

#[given("no image builder is configured")]
fn no_image_builder(live_update_state: &LiveUpdateState) {
    live_update_state.image_collaborators.set(false);
}

#[given("the change deletes {path}")]
fn change_deletes(live_update_state: &LiveUpdateState, path: String) {
    push_to(&live_update_state.deletes, path);
}

#[given("the change copies an archive")]
fn change_copies(live_update_state: &LiveUpdateState) {
    live_update_state.copies_archive.set(true);
}

#[given("the change runs {command}")]
fn change_runs(live_update_state: &LiveUpdateState, command: String) {
    push_to(&live_update_state.commands, command);
}

#[given("the change needs a container restart")]
fn change_needs_restart(live_update_state: &LiveUpdateState) {
    live_update_state.hot_reload.set(false);
}

#[given("the change requires a rebuild")]
fn change_requires_rebuild(live_update_state: &LiveUpdateState) {
    live_update_state.requires_rebuild.set(true);
}

#[given("{command} exits with code {code}")]
fn command_exits_with(
    live_update_state: &LiveUpdateState,
    command: String,
    code: i64,
) -> StepResult<()> {
    let cluster = live_update_state
        .cluster
        .get()
        .ok_or_else(|| missing("cluster"))?;
    cluster.fail_command(&command, code);
    Ok(())
}

#[given("the running container has been replaced")]
fn container_replaced(live_update_state: &LiveUpdateState) -> StepResult<()> {
    let cluster = live_update_state
        .cluster
        .get()
        .ok_or_else(|| missing("cluster"))?;
    cluster.replace_container();
    Ok(())
}

#[given("a local target running {command}")]
fn local_target(live_update_state: &LiveUpdateState, command: String) {
    live_update_state.local_command.set(command);
}

fn delta(live_update_state: &LiveUpdateState) -> StepResult<LiveUpdateDelta> {
    let commands = live_update_state
        .commands
        .get()
        .unwrap_or_default()
        .iter()
        .map(|line| ContainerCommand::new(line.split_whitespace().map(String::from).collect()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    let archive = if live_update_state.copies_archive.get().unwrap_or(false) {
        vec![0x75, 0x73, 0x74, 0x61, 0x72]
    } else {
        Vec::new()
    };
    let built = LiveUpdateDelta::new()
        .with_files_to_delete(live_update_state.deletes.get().unwrap_or_default())
        .with_archive(archive)
        .with_commands(commands)
        .with_hot_reload(live_update_state.hot_reload.get().unwrap_or(true));
    Ok(if live_update_state.requires_rebuild.get().unwrap_or(false) {
        built.requiring_rebuild()
    } else {
        built
    })
}

fn target(live_update_state: &LiveUpdateState) -> StepResult<Target> {
    if let Some(command) = live_update_state.local_command.get() {
        let deploy = Deploy::Local(LocalCommand {
            argv: command.split_whitespace().map(String::from).collect(),
            workdir: None,
            env: Vec::new(),
        });
        return Ok(Target::new(TargetId::new("tools"), deploy));
    }

    let deploy = Deploy::Kubernetes {
        manifest: Manifest {
            name: String::from("web-deployment"),
            yaml: String::from("kind: Deployment\n"),
        },
        image: ImageTarget {
            repository: String::from("web"),
            context: Utf8PathBuf::from("."),
            dockerfile: None,
        },
    };
    let running = RunningContainer {
        container: ContainerRef::new("web-1", "abc123", "app", "default"),
        image_ref: String::from(RUNNING_IMAGE),
    };
    Ok(Target::new(TargetId::new("web"), deploy)
        .with_live_update(delta(live_update_state)?)
        .with_running(vec![running])
        .with_last_build(ImageBuildResult {
            image_ref: String::from(RUNNING_IMAGE),
            digest: String::from("sha256:1"),
        }))
}

fn session_inputs(live_update_state: &LiveUpdateState) -> StepResult<(AppConfig, Collaborators)> {
    let mut config = AppConfig::default();
    if !live_update_state.in_cluster.get().unwrap_or(false) {
        return Ok((config, Collaborators::default()));
    }
    config.cluster.env = Some(ClusterEnv::Kind);

    let cluster = live_update_state
        .cluster
        .get()
        .ok_or_else(|| missing("cluster"))?;
    let mut collaborators = Collaborators {
        cluster: Some(cluster as Arc<dyn ClusterClient>),
        ..Collaborators::default()
    };
    if live_update_state.image_collaborators.get().unwrap_or(false) {
        let deployer = live_update_state
            .deployer
            .get()
            .ok_or_else(|| missing("deployer"))?;
        collaborators.image_builder = Some(Arc::clone(&deployer) as Arc<dyn ImageBuilder>);
        collaborators.manifest_applier = Some(deployer as Arc<dyn ManifestApplier>);
    }
    Ok((config, collaborators))
}

#[when("the target is dispatched")]
fn target_is_dispatched(live_update_state: &LiveUpdateState) -> StepResult<()> {
    let (config, collaborators) = session_inputs(live_update_state)?;
    let target = target(live_update_state)?;
    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;

    let result = runtime.block_on(async {
        let session = Session::assemble(&config, &collaborators)
            .await
            .map_err(|e| format!("session assembly failed: {e}"))?;
        Ok::<_, String>(session.build(&CancellationToken::new(), &target).await)
    })?;

    live_update_state.result.set(match result {
        Ok(outcome) => DispatchResult::Built {
            strategy: outcome.strategy,
        },
        Err(DispatchError::Strategy { strategy, .. }) => DispatchResult::Failed { strategy },
        Err(DispatchError::NoEligibleStrategy { tried, .. }) => {
            DispatchResult::NoEligibleStrategy { tried }
        }
        Err(e) => DispatchResult::Other(e.to_string()),
    });
    Ok(())
}
