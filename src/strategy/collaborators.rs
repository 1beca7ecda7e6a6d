//! Build-side collaborators supplied by the embedding application.
//!
//! These are seams, not implementations: image building, registry pushes,
//! manifest application and compose orchestration all happen outside this
//! crate.

use std::future::Future;
use std::pin::Pin;

use crate::model::{ComposeService, ImageBuildResult, ImageTarget, Manifest, TargetId};

/// Error returned by a collaborator.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future returned by collaborator calls.
pub type CollaboratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CollaboratorError>> + Send + 'a>>;

/// Builds container images.
pub trait ImageBuilder: Send + Sync {
    /// Build `image` for `target`.
    fn build(&self, target: &TargetId, image: &ImageTarget) -> CollaboratorFuture<'_, ImageBuildResult>;
}

/// Pushes built images to a registry the cluster can pull from.
pub trait ImagePusher: Send + Sync {
    /// Push `image`.
    fn push(&self, image: &ImageBuildResult) -> CollaboratorFuture<'_, ()>;
}

/// Applies deployment manifests to the cluster.
pub trait ManifestApplier: Send + Sync {
    /// Apply `manifest` with its image reference replaced by `image`.
    fn apply(&self, manifest: &Manifest, image: &ImageBuildResult) -> CollaboratorFuture<'_, ()>;
}

/// Drives a compose project.
pub trait ComposeClient: Send + Sync {
    /// Bring `service` up, recreating it from `image` when given.
    fn up(
        &self,
        service: &ComposeService,
        image: Option<&ImageBuildResult>,
    ) -> CollaboratorFuture<'_, ()>;
}
