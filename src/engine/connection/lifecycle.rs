//! Container inspection and restart.

use std::future::Future;
use std::pin::Pin;

use bollard::models::ContainerInspectResponse;
use bollard::query_parameters::{InspectContainerOptions, RestartContainerOptions};
use bollard::{Docker, errors::Error as BollardError};

use super::EngineConnector;
use crate::error::{ContainerError, LiveswapError};

/// Boxed future type returned by [`ContainerLifecycle::ping`].
pub type PingFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerLifecycle::inspect_container`].
pub type InspectContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerInspectResponse, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerLifecycle::restart_container`].
pub type RestartContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), BollardError>> + Send + 'a>>;

/// Daemon calls for liveness and container state.
pub trait ContainerLifecycle: Send + Sync {
    /// Ping the daemon.
    fn ping(&self) -> PingFuture<'_>;

    /// Inspect a container.
    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;

    /// Restart a container with the daemon's default stop timeout.
    fn restart_container(&self, container_id: &str) -> RestartContainerFuture<'_>;
}

impl ContainerLifecycle for Docker {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(async move { Self::ping(self).await.map(|_| ()) })
    }

    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::inspect_container(self, &container_id_owned, None::<InspectContainerOptions>)
                .await
        })
    }

    fn restart_container(&self, container_id: &str) -> RestartContainerFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move {
            Self::restart_container(self, &container_id_owned, None::<RestartContainerOptions>)
                .await
        })
    }
}

impl EngineConnector {
    /// Report whether `container_id` exists and is running.
    ///
    /// A container the daemon no longer knows reports `false`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ConnectionFailed` when the daemon cannot be
    /// queried.
    pub async fn container_running_async<C: ContainerLifecycle + ?Sized>(
        client: &C,
        container_id: &str,
    ) -> Result<bool, LiveswapError> {
        match client.inspect_container(container_id).await {
            Ok(response) => Ok(response
                .state
                .and_then(|state| state.running)
                .unwrap_or(false)),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(error) => Err(LiveswapError::from(ContainerError::ConnectionFailed {
                message: format!("failed to inspect container {container_id}: {error}"),
            })),
        }
    }

    /// Restart `container_id`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the daemon refuses.
    pub async fn restart_container_async<C: ContainerLifecycle + ?Sized>(
        client: &C,
        container_id: &str,
    ) -> Result<(), LiveswapError> {
        client
            .restart_container(container_id)
            .await
            .map_err(|error| {
                LiveswapError::from(ContainerError::ExecFailed {
                    container_id: String::from(container_id),
                    message: format!("restart failed: {error}"),
                })
            })
    }
}
