//! Daemon health check.

use std::time::Duration;

use super::{ContainerLifecycle, EngineConnector};
use crate::error::{ContainerError, LiveswapError};

impl EngineConnector {
    /// Verify the daemon answers a ping within `timeout` (async version).
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckTimeout` when the ping does not
    /// complete in time and `ContainerError::HealthCheckFailed` when the
    /// daemon rejects it.
    pub async fn health_check_async<C: ContainerLifecycle + ?Sized>(
        client: &C,
        timeout: Duration,
    ) -> Result<(), LiveswapError> {
        tokio::time::timeout(timeout, client.ping())
            .await
            .map_err(|_| {
                LiveswapError::from(ContainerError::HealthCheckTimeout {
                    seconds: timeout.as_secs(),
                })
            })?
            .map_err(|e| {
                LiveswapError::from(ContainerError::HealthCheckFailed {
                    message: e.to_string(),
                })
            })
    }

    /// Verify the daemon answers a ping within `timeout`.
    ///
    /// Creates a dedicated runtime; use [`Self::health_check_async`] inside
    /// an async context.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::RuntimeCreationFailed` if the runtime cannot
    /// be created, otherwise the errors of [`Self::health_check_async`].
    pub fn health_check<C: ContainerLifecycle + ?Sized>(
        client: &C,
        timeout: Duration,
    ) -> Result<(), LiveswapError> {
        let rt = Self::create_runtime()?;
        rt.block_on(Self::health_check_async(client, timeout))
    }
}
