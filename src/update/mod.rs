//! In-place container updaters.
//!
//! Every updater honours the same protocol for one [`UpdateSpec`]:
//!
//! 1. remove `files_to_delete` (skipped when empty);
//! 2. unpack `archive_to_copy` into the container root;
//! 3. run each command in order, stopping at the first non-zero exit;
//! 4. restart the container when hot reload is not allowed, if the
//!    transport can.
//!
//! A failure at any step aborts the remaining steps. Cancellation is checked
//! before each step and nothing is rolled back. The variants differ only in
//! transport: the local container daemon, a sidecar proxy in the pod, or
//! one remote command per step through the cluster API.

mod daemon;
mod exec;
mod guard;
mod sidecar;

pub use daemon::DirectDaemonUpdater;
pub use exec::RemoteExecUpdater;
pub use sidecar::{
    SidecarConnectFuture, SidecarConnector, SidecarError, SidecarEvent, SidecarEventStream,
    SidecarProxyUpdater, SidecarRequest, SidecarSession,
};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{UpdateError, UpdateStage};
use crate::mode::UpdaterKind;
use crate::model::{ContainerCommand, ContainerRef, UpdateSpec};

/// The transport a live update is applied through.
pub enum ContainerUpdater {
    /// Native calls against the local container daemon.
    DirectDaemon(DirectDaemonUpdater),
    /// A streamed update through the pod's sidecar proxy.
    SidecarProxy(SidecarProxyUpdater),
    /// One remote command per step through the cluster API.
    RemoteExec(RemoteExecUpdater),
}

impl ContainerUpdater {
    /// Return which transport this updater uses.
    #[must_use]
    pub const fn kind(&self) -> UpdaterKind {
        match self {
            Self::DirectDaemon(_) => UpdaterKind::DirectDaemon,
            Self::SidecarProxy(_) => UpdaterKind::SidecarProxy,
            Self::RemoteExec(_) => UpdaterKind::RemoteExec,
        }
    }

    /// Check that `container` is still the running instance.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::Transport` when the transport cannot answer.
    pub async fn revalidate(&self, container: &ContainerRef) -> Result<bool, UpdateError> {
        match self {
            Self::DirectDaemon(updater) => updater.revalidate(container).await,
            Self::SidecarProxy(updater) => updater.revalidate(container).await,
            Self::RemoteExec(updater) => updater.revalidate(container).await,
        }
    }

    /// Apply `spec` to `container`.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::ContainerBusy` when another update to the same
    /// container is in flight through this updater, and otherwise the first
    /// protocol failure: `Capability` before any transport call, `Transport`
    /// or `Cancelled` naming the step, or `Command` for a non-zero exit.
    pub async fn apply_update(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        spec: &UpdateSpec,
    ) -> Result<(), UpdateError> {
        let _claim = match self {
            Self::DirectDaemon(updater) => updater.in_flight().acquire(container)?,
            Self::SidecarProxy(updater) => updater.in_flight().acquire(container)?,
            Self::RemoteExec(updater) => updater.in_flight().acquire(container)?,
        };
        info!(
            updater = %self.kind(),
            container = %container,
            deletes = spec.files_to_delete().len(),
            archive_bytes = spec.archive_to_copy().len(),
            commands = spec.commands().len(),
            hot_reload = spec.hot_reload_allowed(),
            "applying live update"
        );
        match self {
            Self::DirectDaemon(updater) => updater.apply(cancel, container, spec).await,
            Self::SidecarProxy(updater) => updater.apply(cancel, container, spec).await,
            Self::RemoteExec(updater) => updater.apply(cancel, container, spec).await,
        }
    }
}

impl From<DirectDaemonUpdater> for ContainerUpdater {
    fn from(updater: DirectDaemonUpdater) -> Self {
        Self::DirectDaemon(updater)
    }
}

impl From<SidecarProxyUpdater> for ContainerUpdater {
    fn from(updater: SidecarProxyUpdater) -> Self {
        Self::SidecarProxy(updater)
    }
}

impl From<RemoteExecUpdater> for ContainerUpdater {
    fn from(updater: RemoteExecUpdater) -> Self {
        Self::RemoteExec(updater)
    }
}

fn ensure_not_cancelled(
    cancel: &CancellationToken,
    container: &ContainerRef,
    stage: UpdateStage,
) -> Result<(), UpdateError> {
    if cancel.is_cancelled() {
        return Err(UpdateError::Cancelled {
            container: container.clone(),
            stage,
        });
    }
    Ok(())
}

fn announce_command(container: &ContainerRef, index: usize, total: usize, command: &ContainerCommand) {
    info!(
        target: "liveswap::output",
        source = %container,
        "[CMD {}/{}] {}",
        index + 1,
        total,
        command
    );
}

fn transport_error(
    container: &ContainerRef,
    stage: UpdateStage,
    message: impl Into<String>,
) -> UpdateError {
    UpdateError::Transport {
        container: container.clone(),
        stage,
        message: message.into(),
    }
}

fn command_error(
    container: &ContainerRef,
    index: usize,
    command: &ContainerCommand,
    exit_code: i64,
) -> UpdateError {
    UpdateError::Command {
        index,
        argv: command.argv().to_vec(),
        exit_code,
        container: container.clone(),
    }
}

fn delete_argv(paths: &[String]) -> Vec<String> {
    let mut argv = vec![String::from("rm"), String::from("-rf")];
    argv.extend(paths.iter().cloned());
    argv
}
