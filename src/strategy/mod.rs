//! Build-and-deploy strategies.
//!
//! A strategy either handles a target or declines it. Declining comes in
//! two forms: [`BuildAndDeployer::can_handle`] returning `false` before any
//! work, and [`StrategyResult::Ineligible`] once a strategy has looked more
//! closely without mutating anything. Both let the dispatcher try the next
//! strategy. [`StrategyResult::Failed`] ends the cycle for the target.

mod collaborators;
mod compose;
mod image;
mod live_update;
mod local;

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

pub use collaborators::{
    CollaboratorError, CollaboratorFuture, ComposeClient, ImageBuilder, ImagePusher,
    ManifestApplier,
};
pub use compose::ComposeStrategy;
pub use image::FullImageStrategy;
pub use live_update::LiveUpdateStrategy;
pub use local::LocalStrategy;

use crate::error::BuildError;
use crate::mode::ResolvedUpdateMode;
use crate::model::{BuildOutcome, Target};

/// Outcome of one strategy attempt.
#[derive(Debug)]
pub enum StrategyResult {
    /// The target was built and deployed.
    Success(BuildOutcome),
    /// The strategy declined after inspection; nothing was mutated.
    Ineligible {
        /// Why the strategy declined.
        reason: String,
    },
    /// The strategy failed; no other strategy may run this cycle.
    Failed(BuildError),
}

impl StrategyResult {
    fn ineligible(reason: impl Into<String>) -> Self {
        Self::Ineligible {
            reason: reason.into(),
        }
    }
}

/// Boxed future returned by [`BuildAndDeployer::build`].
pub type BuildFuture<'a> = Pin<Box<dyn Future<Output = StrategyResult> + Send + 'a>>;

/// One way of getting a target's changes running.
pub trait BuildAndDeployer: Send + Sync {
    /// Stable strategy name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether the strategy applies to `target` at all.
    fn can_handle(&self, target: &Target) -> bool;

    /// Build and deploy `target`.
    fn build<'a>(&'a self, cancel: &'a CancellationToken, target: &'a Target) -> BuildFuture<'a>;
}

/// The closed set of strategies a session dispatches to.
pub enum Strategy {
    /// In-place container updates.
    LiveUpdate(LiveUpdateStrategy),
    /// Image build, push and manifest apply.
    FullImage(FullImageStrategy),
    /// Compose service rebuild.
    Compose(ComposeStrategy),
    /// Host command.
    Local(LocalStrategy),
}

impl BuildAndDeployer for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Self::LiveUpdate(_) => LiveUpdateStrategy::NAME,
            Self::FullImage(_) => FullImageStrategy::NAME,
            Self::Compose(_) => ComposeStrategy::NAME,
            Self::Local(_) => LocalStrategy::NAME,
        }
    }

    fn can_handle(&self, target: &Target) -> bool {
        match self {
            Self::LiveUpdate(strategy) => strategy.can_handle(target),
            Self::FullImage(_) => FullImageStrategy::can_handle(target),
            Self::Compose(_) => ComposeStrategy::can_handle(target),
            Self::Local(_) => LocalStrategy::can_handle(target),
        }
    }

    fn build<'a>(&'a self, cancel: &'a CancellationToken, target: &'a Target) -> BuildFuture<'a> {
        Box::pin(async move {
            match self {
                Self::LiveUpdate(strategy) => strategy.build(cancel, target).await,
                Self::FullImage(strategy) => strategy.build(cancel, target).await,
                Self::Compose(strategy) => strategy.build(cancel, target).await,
                Self::Local(strategy) => strategy.build(cancel, target).await,
            }
        })
    }
}

/// Order strategies are tried in: live update, full image, compose, local.
///
/// Live update is left out when the session resolved to image builds, and
/// strategies whose collaborators are absent are skipped.
#[must_use]
pub fn default_build_order(
    mode: ResolvedUpdateMode,
    live_update: Option<LiveUpdateStrategy>,
    full_image: Option<FullImageStrategy>,
    compose: Option<ComposeStrategy>,
    local: LocalStrategy,
) -> Vec<Strategy> {
    let live = live_update.filter(|_| mode.is_live_update());
    live.map(Strategy::LiveUpdate)
        .into_iter()
        .chain(full_image.map(Strategy::FullImage))
        .chain(compose.map(Strategy::Compose))
        .chain(std::iter::once(Strategy::Local(local)))
        .collect()
}

fn cancelled(target: &Target) -> StrategyResult {
    StrategyResult::Failed(BuildError::Cancelled {
        target: target.id().clone(),
    })
}
