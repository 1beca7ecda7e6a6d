//! Updates through the local container daemon.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::guard::InFlight;
use super::{announce_command, command_error, delete_argv, ensure_not_cancelled, transport_error};
use crate::engine::{DaemonClient, EngineConnector, ExecRequest};
use crate::error::{LiveswapError, UpdateError, UpdateStage};
use crate::model::{ContainerRef, UpdateSpec};
use crate::output::CommandLog;

/// Applies updates with native daemon calls.
///
/// Used when the cluster shares the local daemon or for compose services.
/// This is the only transport that restarts containers itself.
pub struct DirectDaemonUpdater {
    daemon: Arc<dyn DaemonClient>,
    in_flight: InFlight,
}

impl DirectDaemonUpdater {
    /// Create an updater talking to `daemon`.
    #[must_use]
    pub fn new(daemon: Arc<dyn DaemonClient>) -> Self {
        Self {
            daemon,
            in_flight: InFlight::default(),
        }
    }

    pub(super) const fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(super) async fn revalidate(&self, container: &ContainerRef) -> Result<bool, UpdateError> {
        EngineConnector::container_running_async(self.daemon.as_ref(), container.container_id())
            .await
            .map_err(|error| transport_error(container, UpdateStage::Revalidate, error.to_string()))
    }

    pub(super) async fn apply(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        spec: &UpdateSpec,
    ) -> Result<(), UpdateError> {
        let mut log = CommandLog::new(container.to_string());

        if !spec.files_to_delete().is_empty() {
            ensure_not_cancelled(cancel, container, UpdateStage::Delete)?;
            let exit_code = self
                .exec(container, UpdateStage::Delete, delete_argv(spec.files_to_delete()), &mut log)
                .await?;
            if exit_code != 0 {
                return Err(transport_error(
                    container,
                    UpdateStage::Delete,
                    format!("removing files exited with code {exit_code}"),
                ));
            }
        }

        if !spec.archive_to_copy().is_empty() {
            ensure_not_cancelled(cancel, container, UpdateStage::Copy)?;
            EngineConnector::upload_archive_async(
                self.daemon.as_ref(),
                container.container_id(),
                spec.archive_to_copy().to_vec(),
            )
            .await
            .map_err(|error| transport_error(container, UpdateStage::Copy, error.to_string()))?;
        }

        let total = spec.commands().len();
        for (index, command) in spec.commands().iter().enumerate() {
            ensure_not_cancelled(cancel, container, UpdateStage::Run(index))?;
            announce_command(container, index, total, command);
            let exit_code = self
                .exec(container, UpdateStage::Run(index), command.argv().to_vec(), &mut log)
                .await?;
            if exit_code != 0 {
                return Err(command_error(container, index, command, exit_code));
            }
        }

        if !spec.hot_reload_allowed() {
            ensure_not_cancelled(cancel, container, UpdateStage::Restart)?;
            debug!(container = %container, "restarting container after update");
            EngineConnector::restart_container_async(self.daemon.as_ref(), container.container_id())
                .await
                .map_err(|error| {
                    transport_error(container, UpdateStage::Restart, error.to_string())
                })?;
        }
        Ok(())
    }

    async fn exec(
        &self,
        container: &ContainerRef,
        stage: UpdateStage,
        argv: Vec<String>,
        log: &mut CommandLog,
    ) -> Result<i64, UpdateError> {
        let to_transport =
            |error: LiveswapError| transport_error(container, stage, error.to_string());
        let request = ExecRequest::new(container.container_id(), argv).map_err(to_transport)?;
        EngineConnector::exec_async(self.daemon.as_ref(), &request, log)
            .await
            .map(|result| result.exit_code())
            .map_err(to_transport)
    }
}
