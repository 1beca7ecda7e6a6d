//! Full image rebuild and redeploy for cluster targets.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ImageBuilder, ImagePusher, ManifestApplier, StrategyResult, cancelled};
use crate::error::BuildError;
use crate::model::{BuildOutcome, Deploy, Target};

/// Builds the image, pushes it when needed and applies the manifest.
pub struct FullImageStrategy {
    builder: Arc<dyn ImageBuilder>,
    pusher: Option<Arc<dyn ImagePusher>>,
    applier: Arc<dyn ManifestApplier>,
}

impl FullImageStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "full-image";

    /// Create the strategy. Pass no pusher when the cluster runs images
    /// straight from the local daemon.
    #[must_use]
    pub fn new(
        builder: Arc<dyn ImageBuilder>,
        pusher: Option<Arc<dyn ImagePusher>>,
        applier: Arc<dyn ManifestApplier>,
    ) -> Self {
        Self {
            builder,
            pusher,
            applier,
        }
    }

    pub(super) const fn can_handle(target: &Target) -> bool {
        matches!(target.deploy(), Deploy::Kubernetes { .. })
    }

    pub(super) async fn build(&self, cancel: &CancellationToken, target: &Target) -> StrategyResult {
        let Deploy::Kubernetes { manifest, image } = target.deploy() else {
            return StrategyResult::ineligible("not a cluster target");
        };
        if cancel.is_cancelled() {
            return cancelled(target);
        }

        info!(target_id = %target.id(), repository = %image.repository, "building image");
        let built = match self.builder.build(target.id(), image).await {
            Ok(built) => built,
            Err(error) => {
                return StrategyResult::Failed(BuildError::ImageBuild {
                    target: target.id().clone(),
                    message: error.to_string(),
                });
            }
        };

        if let Some(pusher) = &self.pusher {
            if cancel.is_cancelled() {
                return cancelled(target);
            }
            debug!(image = %built.image_ref, "pushing image");
            if let Err(error) = pusher.push(&built).await {
                return StrategyResult::Failed(BuildError::ImagePush {
                    image_ref: built.image_ref.clone(),
                    message: error.to_string(),
                });
            }
        }

        if cancel.is_cancelled() {
            return cancelled(target);
        }
        if let Err(error) = self.applier.apply(manifest, &built).await {
            return StrategyResult::Failed(BuildError::ManifestApply {
                manifest: manifest.name.clone(),
                message: error.to_string(),
            });
        }

        StrategyResult::Success(BuildOutcome {
            image: Some(built),
            ..BuildOutcome::new(Self::NAME, target.id().clone())
        })
    }
}
