//! The `sync` command: one live update applied to one container.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::CommandOutcome;
use crate::archive::{CopyMapping, build_update_archive};
use crate::config::AppConfig;
use crate::error::{LiveswapError, Result as LiveswapResult, UpdateError};
use crate::model::{ContainerCommand, ContainerRef, UpdateSpec};
use crate::session::{Collaborators, Session};

/// A single-container update described in host terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    /// Pod hosting the container; `None` for a daemon-managed container.
    pub pod: Option<String>,
    /// Container name in the pod, or daemon container name.
    pub container: String,
    /// Expected runtime container ID.
    pub container_id: Option<String>,
    /// Pod namespace; the configured namespace when `None`.
    pub namespace: Option<String>,
    /// Absolute container paths to remove.
    pub delete: Vec<String>,
    /// Host paths to copy in.
    pub copy: Vec<CopyMapping>,
    /// Shell commands to run afterwards.
    pub run: Vec<String>,
    /// Restart the container instead of relying on hot reload.
    pub restart: bool,
}

impl SyncRequest {
    fn container_ref(&self, config: &AppConfig) -> ContainerRef {
        match &self.pod {
            Some(pod) => ContainerRef::new(
                pod.as_str(),
                self.container_id.clone().unwrap_or_default(),
                self.container.as_str(),
                self.namespace
                    .clone()
                    .unwrap_or_else(|| config.cluster.namespace.clone()),
            ),
            None => ContainerRef::daemon(
                self.container_id
                    .clone()
                    .unwrap_or_else(|| self.container.clone()),
                self.container.as_str(),
            ),
        }
    }

    fn update_spec(&self) -> LiveswapResult<UpdateSpec> {
        let archive = if self.copy.is_empty() {
            Vec::new()
        } else {
            build_update_archive(&self.copy)?
        };
        Ok(UpdateSpec::new(
            self.delete.clone(),
            archive,
            self.run.iter().map(ContainerCommand::shell).collect(),
            !self.restart,
        ))
    }
}

/// Apply `request` through the session's updater.
///
/// A command that exits non-zero is reported as
/// [`CommandOutcome::CommandExit`] rather than an error.
///
/// # Errors
///
/// Returns `FilesystemError` when a host path cannot be archived,
/// `ConfigError` when the session cannot be assembled or has no updater
/// for the container, and `UpdateError` for capability, transport or
/// cancellation failures.
pub async fn sync(
    config: &AppConfig,
    collaborators: &Collaborators,
    request: &SyncRequest,
    cancel: &CancellationToken,
) -> LiveswapResult<CommandOutcome> {
    let spec = request.update_spec()?;
    let container = request.container_ref(config);
    let session = Session::assemble(config, collaborators).await?;

    match session.update_container(cancel, &container, &spec).await {
        Ok(()) => {
            info!(container = %container, "live update applied");
            Ok(CommandOutcome::Success)
        }
        Err(LiveswapError::Update(UpdateError::Command {
            index,
            exit_code,
            ..
        })) => {
            warn!(container = %container, index, exit_code, "update command failed");
            Ok(CommandOutcome::CommandExit { code: exit_code })
        }
        Err(error) => Err(error),
    }
}
