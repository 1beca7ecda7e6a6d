//! Composite dispatch over an ordered list of strategies.

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};

use crate::error::DispatchError;
use crate::model::{BuildOutcome, Target};
use crate::strategy::{BuildAndDeployer, Strategy, StrategyResult};

/// Tries strategies in priority order until one handles the target.
///
/// Ineligibility moves on to the next strategy; a failure ends the cycle
/// with no further attempts.
pub struct CompositeDispatcher<S: BuildAndDeployer = Strategy> {
    strategies: Vec<S>,
}

impl<S: BuildAndDeployer> CompositeDispatcher<S> {
    /// Create a dispatcher over `strategies`, highest priority first.
    #[must_use]
    pub const fn new(strategies: Vec<S>) -> Self {
        Self { strategies }
    }

    /// Strategy names in the order they are tried.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.strategies.iter().map(BuildAndDeployer::name).collect()
    }

    /// Build and deploy `target` with the first strategy that accepts it.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Strategy` when the accepting strategy fails,
    /// `DispatchError::NoEligibleStrategy` when none accepts, and
    /// `DispatchError::Cancelled` when `cancel` fires between attempts.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        target: &Target,
    ) -> Result<BuildOutcome, DispatchError> {
        let mut tried = Vec::new();
        for strategy in &self.strategies {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled {
                    target: target.id().clone(),
                });
            }
            let name = strategy.name();
            tried.push(name);
            if !strategy.can_handle(target) {
                debug!(strategy = name, target = %target.id(), "strategy does not apply");
                continue;
            }

            let span = info_span!("build_and_deploy", strategy = name, target = %target.id());
            match strategy.build(cancel, target).instrument(span).await {
                StrategyResult::Success(outcome) => {
                    info!(strategy = name, target = %target.id(), "target built");
                    return Ok(outcome);
                }
                StrategyResult::Ineligible { reason } => {
                    info!(strategy = name, target = %target.id(), %reason, "strategy declined, trying next");
                }
                StrategyResult::Failed(source) => {
                    return Err(DispatchError::Strategy {
                        strategy: name,
                        target: target.id().clone(),
                        source,
                    });
                }
            }
        }
        Err(DispatchError::NoEligibleStrategy {
            target: target.id().clone(),
            tried,
        })
    }
}
