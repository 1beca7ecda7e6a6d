//! Updates through remote commands in the pod container.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::guard::InFlight;
use super::{announce_command, command_error, delete_argv, ensure_not_cancelled, transport_error};
use crate::cluster::{ClusterClient, ClusterError, PodExecRequest};
use crate::error::{UpdateError, UpdateStage};
use crate::mode::UpdaterKind;
use crate::model::{ContainerRef, UpdateSpec};
use crate::output::CommandLog;

/// Unpacks an archive read from stdin into the container root.
const EXTRACT_ARGV: [&str; 6] = ["tar", "-C", "/", "-x", "-f", "-"];

/// Applies updates as one remote command per step.
///
/// The transport can neither restart a container nor observe a restart, so
/// updates that disallow hot reload are refused up front.
pub struct RemoteExecUpdater {
    cluster: Arc<dyn ClusterClient>,
    in_flight: InFlight,
}

impl RemoteExecUpdater {
    /// Create an updater running commands through `cluster`.
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            in_flight: InFlight::default(),
        }
    }

    pub(super) const fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(super) async fn revalidate(&self, container: &ContainerRef) -> Result<bool, UpdateError> {
        self.cluster
            .container_running(container)
            .await
            .map_err(|error| transport_error(container, UpdateStage::Revalidate, error.to_string()))
    }

    pub(super) async fn apply(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        spec: &UpdateSpec,
    ) -> Result<(), UpdateError> {
        if !spec.hot_reload_allowed() {
            return Err(UpdateError::Capability {
                updater: UpdaterKind::RemoteExec,
                message: String::from(
                    "remote exec does not support restarting the container; \
                     use the container or sync update mode, or allow hot reload",
                ),
            });
        }

        let mut log = CommandLog::new(container.to_string());

        if !spec.files_to_delete().is_empty() {
            ensure_not_cancelled(cancel, container, UpdateStage::Delete)?;
            self.run_step(
                container,
                UpdateStage::Delete,
                delete_argv(spec.files_to_delete()),
                Vec::new(),
                &mut log,
            )
            .await?;
        }

        if !spec.archive_to_copy().is_empty() {
            ensure_not_cancelled(cancel, container, UpdateStage::Copy)?;
            let argv = EXTRACT_ARGV.iter().map(|word| String::from(*word)).collect();
            self.run_step(
                container,
                UpdateStage::Copy,
                argv,
                spec.archive_to_copy().to_vec(),
                &mut log,
            )
            .await?;
        }

        let total = spec.commands().len();
        for (index, command) in spec.commands().iter().enumerate() {
            ensure_not_cancelled(cancel, container, UpdateStage::Run(index))?;
            announce_command(container, index, total, command);
            let request = PodExecRequest::new(container, command.argv().to_vec());
            match self.cluster.exec(&request, Vec::new(), &mut log).await {
                Ok(()) => {}
                Err(ClusterError::Exit { code }) => {
                    return Err(command_error(container, index, command, code));
                }
                Err(ClusterError::Transport { message }) => {
                    return Err(transport_error(container, UpdateStage::Run(index), message));
                }
            }
        }
        Ok(())
    }

    /// Run a protocol step; any failure, including a non-zero exit, is a
    /// transport failure at `stage`.
    async fn run_step(
        &self,
        container: &ContainerRef,
        stage: UpdateStage,
        argv: Vec<String>,
        stdin: Vec<u8>,
        log: &mut CommandLog,
    ) -> Result<(), UpdateError> {
        let request = PodExecRequest::new(container, argv);
        self.cluster
            .exec(&request, stdin, log)
            .await
            .map_err(|error| transport_error(container, stage, error.to_string()))
    }
}
