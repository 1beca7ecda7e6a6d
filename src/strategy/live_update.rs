//! In-place updates of the containers backing a target.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{StrategyResult, cancelled};
use crate::error::{BuildError, ErrorKind, UpdateError};
use crate::model::{BuildOutcome, ContainerRef, Deploy, Target, UpdateSpec};
use crate::update::ContainerUpdater;

/// Applies a target's live-update delta to every running container.
///
/// Cluster targets use the session's resolved updater; compose targets need
/// the direct daemon updater.
pub struct LiveUpdateStrategy {
    cluster_updater: Option<Arc<ContainerUpdater>>,
    daemon_updater: Option<Arc<ContainerUpdater>>,
}

impl LiveUpdateStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "live-update";

    /// Create the strategy from the updaters the session could build.
    #[must_use]
    pub const fn new(
        cluster_updater: Option<Arc<ContainerUpdater>>,
        daemon_updater: Option<Arc<ContainerUpdater>>,
    ) -> Self {
        Self {
            cluster_updater,
            daemon_updater,
        }
    }

    fn updater_for(&self, target: &Target) -> Option<&ContainerUpdater> {
        match target.deploy() {
            Deploy::Kubernetes { .. } => self.cluster_updater.as_deref(),
            Deploy::Compose { .. } => self.daemon_updater.as_deref(),
            Deploy::Local(_) => None,
        }
    }

    pub(super) fn can_handle(&self, target: &Target) -> bool {
        self.updater_for(target).is_some()
            && target
                .live_update()
                .is_some_and(|delta| !delta.requires_rebuild())
            && target.running_matches_last_build()
    }

    pub(super) async fn build(&self, cancel: &CancellationToken, target: &Target) -> StrategyResult {
        let (Some(updater), Some(delta)) = (self.updater_for(target), target.live_update()) else {
            return StrategyResult::ineligible("no live-update transport for this target");
        };

        for running in target.running() {
            if cancel.is_cancelled() {
                return cancelled(target);
            }
            match updater.revalidate(&running.container).await {
                Ok(true) => {}
                Ok(false) => {
                    return StrategyResult::ineligible(format!(
                        "{} is no longer running",
                        running.container
                    ));
                }
                Err(error) => {
                    return StrategyResult::Failed(BuildError::Update {
                        container: running.container.clone(),
                        source: error,
                    });
                }
            }
        }

        let spec = UpdateSpec::from_delta(delta);
        let mut progress = Progress::default();
        for (position, running) in target.running().iter().enumerate() {
            let container = &running.container;
            match updater.apply_update(cancel, container, &spec).await {
                Ok(()) => {
                    debug!(container = %container, "container updated in place");
                    progress.updated.push(container.clone());
                }
                Err(error @ UpdateError::Capability { .. }) if position == 0 => {
                    info!(%error, "live update unsupported, falling back");
                    return StrategyResult::ineligible(error.to_string());
                }
                Err(error) if error.kind() == ErrorKind::Command => {
                    warn!(container = %container, %error, "command failed, continuing with remaining containers");
                    progress.record_failure(container, error);
                }
                Err(error) => return StrategyResult::Failed(progress.abort(target, container, error)),
            }
        }

        match progress.first_failure {
            Some(source) => StrategyResult::Failed(BuildError::LiveUpdate {
                target: target.id().clone(),
                updated: progress.updated,
                failed: progress.failed,
                source,
            }),
            None => StrategyResult::Success(BuildOutcome {
                image: target.last_build().cloned(),
                updated_containers: progress.updated,
                ..BuildOutcome::new(Self::NAME, target.id().clone())
            }),
        }
    }
}

#[derive(Default)]
struct Progress {
    updated: Vec<ContainerRef>,
    failed: Vec<ContainerRef>,
    first_failure: Option<UpdateError>,
}

impl Progress {
    fn record_failure(&mut self, container: &ContainerRef, error: UpdateError) {
        self.failed.push(container.clone());
        if self.first_failure.is_none() {
            self.first_failure = Some(error);
        }
    }

    /// Stop at `container`, reporting the mixed state when anything was
    /// already touched.
    fn abort(mut self, target: &Target, container: &ContainerRef, error: UpdateError) -> BuildError {
        if self.updated.is_empty() && self.failed.is_empty() {
            return BuildError::Update {
                container: container.clone(),
                source: error,
            };
        }
        self.failed.push(container.clone());
        BuildError::LiveUpdate {
            target: target.id().clone(),
            updated: self.updated,
            failed: self.failed,
            source: error,
        }
    }
}
