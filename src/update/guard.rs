//! Per-container in-flight registry.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::UpdateError;
use crate::model::ContainerRef;

/// Lock `mutex`, recovering the data if a holder panicked.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Containers with an update currently being applied through one updater.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    containers: Mutex<HashSet<ContainerRef>>,
}

impl InFlight {
    /// Claim `container` for the lifetime of the returned guard.
    ///
    /// A container that is already claimed is refused rather than queued.
    pub(super) fn acquire(&self, container: &ContainerRef) -> Result<InFlightGuard<'_>, UpdateError> {
        if !lock(&self.containers).insert(container.clone()) {
            return Err(UpdateError::ContainerBusy {
                container: container.clone(),
            });
        }
        Ok(InFlightGuard {
            registry: self,
            container: container.clone(),
        })
    }
}

/// Releases the claimed container on drop.
#[derive(Debug)]
pub(super) struct InFlightGuard<'a> {
    registry: &'a InFlight,
    container: ContainerRef,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(&self.registry.containers).remove(&self.container);
    }
}
