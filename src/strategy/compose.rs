//! Compose service rebuilds.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ComposeClient, ImageBuilder, StrategyResult, cancelled};
use crate::error::BuildError;
use crate::model::{BuildOutcome, Deploy, Target};

/// Builds the service image, if declared, then runs `compose up`.
pub struct ComposeStrategy {
    builder: Option<Arc<dyn ImageBuilder>>,
    compose: Arc<dyn ComposeClient>,
}

impl ComposeStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "compose";

    /// Create the strategy.
    #[must_use]
    pub fn new(builder: Option<Arc<dyn ImageBuilder>>, compose: Arc<dyn ComposeClient>) -> Self {
        Self { builder, compose }
    }

    pub(super) const fn can_handle(target: &Target) -> bool {
        target.is_compose()
    }

    pub(super) async fn build(&self, cancel: &CancellationToken, target: &Target) -> StrategyResult {
        let Deploy::Compose { service, image } = target.deploy() else {
            return StrategyResult::ineligible("not a compose target");
        };
        if cancel.is_cancelled() {
            return cancelled(target);
        }

        let built = match (image, &self.builder) {
            (None, _) => None,
            (Some(_), None) => {
                return StrategyResult::Failed(BuildError::ImageBuild {
                    target: target.id().clone(),
                    message: String::from("the service declares an image but no image builder is configured"),
                });
            }
            (Some(declared), Some(builder)) => match builder.build(target.id(), declared).await {
                Ok(built) => Some(built),
                Err(error) => {
                    return StrategyResult::Failed(BuildError::ImageBuild {
                        target: target.id().clone(),
                        message: error.to_string(),
                    });
                }
            },
        };

        if cancel.is_cancelled() {
            return cancelled(target);
        }
        info!(service = %service.service, "bringing compose service up");
        if let Err(error) = self.compose.up(service, built.as_ref()).await {
            return StrategyResult::Failed(BuildError::ComposeUp {
                service: service.service.clone(),
                message: error.to_string(),
            });
        }

        StrategyResult::Success(BuildOutcome {
            image: built,
            ..BuildOutcome::new(Self::NAME, target.id().clone())
        })
    }
}
