//! Deployable targets and build results.

use camino::Utf8PathBuf;

use super::{ContainerRef, LiveUpdateDelta, TargetId};

/// Image a target is built into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    /// Repository name the built image is tagged with.
    pub repository: String,
    /// Build context directory on the host.
    pub context: Utf8PathBuf,
    /// Dockerfile path, relative to the context when not absolute.
    pub dockerfile: Option<Utf8PathBuf>,
}

/// A rendered Kubernetes manifest, opaque to the dispatch engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Human-readable manifest name.
    pub name: String,
    /// YAML body handed to the manifest applier.
    pub yaml: String,
}

/// A service declared in a compose project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeService {
    /// Compose files making up the project.
    pub project_files: Vec<Utf8PathBuf>,
    /// Service name within the project.
    pub service: String,
}

/// A command run directly on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCommand {
    /// Argument vector of the command.
    pub argv: Vec<String>,
    /// Working directory, defaulting to the current directory.
    pub workdir: Option<Utf8PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

/// How a target is deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deploy {
    /// Built into an image and deployed to a cluster from a manifest.
    Kubernetes {
        /// Manifest applied after the image is built.
        manifest: Manifest,
        /// Image built for the workload.
        image: ImageTarget,
    },
    /// Run as a compose service on the local daemon.
    Compose {
        /// The compose service.
        service: ComposeService,
        /// Image built before `up`, if the service declares one.
        image: Option<ImageTarget>,
    },
    /// Run on the host, bypassing containers.
    Local(LocalCommand),
}

/// A container observed backing a target, with the image it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    /// The container handle.
    pub container: ContainerRef,
    /// Image reference the container was started from.
    pub image_ref: String,
}

/// Result of an image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuildResult {
    /// Fully qualified image reference.
    pub image_ref: String,
    /// Content digest of the image.
    pub digest: String,
}

/// A deployable unit and its state for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    id: TargetId,
    deploy: Deploy,
    live_update: Option<LiveUpdateDelta>,
    running: Vec<RunningContainer>,
    last_build: Option<ImageBuildResult>,
}

impl Target {
    /// Create a target with no running containers and no build history.
    #[must_use]
    pub const fn new(id: TargetId, deploy: Deploy) -> Self {
        Self {
            id,
            deploy,
            live_update: None,
            running: Vec::new(),
            last_build: None,
        }
    }

    /// Attach this cycle's live-update delta.
    #[must_use]
    pub fn with_live_update(mut self, delta: LiveUpdateDelta) -> Self {
        self.live_update = Some(delta);
        self
    }

    /// Record the containers currently backing the target.
    #[must_use]
    pub fn with_running(mut self, running: Vec<RunningContainer>) -> Self {
        self.running = running;
        self
    }

    /// Record the last successful image build.
    #[must_use]
    pub fn with_last_build(mut self, build: ImageBuildResult) -> Self {
        self.last_build = Some(build);
        self
    }

    /// Return the target identifier.
    #[must_use]
    pub const fn id(&self) -> &TargetId {
        &self.id
    }

    /// Return the deployment description.
    #[must_use]
    pub const fn deploy(&self) -> &Deploy {
        &self.deploy
    }

    /// Return this cycle's live-update delta, if any.
    #[must_use]
    pub const fn live_update(&self) -> Option<&LiveUpdateDelta> {
        self.live_update.as_ref()
    }

    /// Return the containers currently backing the target.
    #[must_use]
    pub fn running(&self) -> &[RunningContainer] {
        &self.running
    }

    /// Return the last successful image build.
    #[must_use]
    pub const fn last_build(&self) -> Option<&ImageBuildResult> {
        self.last_build.as_ref()
    }

    /// Whether the target is deployed as containers.
    #[must_use]
    pub const fn is_containerized(&self) -> bool {
        !matches!(self.deploy, Deploy::Local(_))
    }

    /// Whether the target is a compose service.
    #[must_use]
    pub const fn is_compose(&self) -> bool {
        matches!(self.deploy, Deploy::Compose { .. })
    }

    /// Whether every running container runs the last successfully built image.
    ///
    /// False when nothing is running or nothing has been built yet.
    #[must_use]
    pub fn running_matches_last_build(&self) -> bool {
        let Some(build) = &self.last_build else {
            return false;
        };
        !self.running.is_empty()
            && self
                .running
                .iter()
                .all(|running| running.image_ref == build.image_ref)
    }
}

/// What a successful strategy did to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Name of the strategy that handled the target.
    pub strategy: &'static str,
    /// The target that was built.
    pub target: TargetId,
    /// The image built, when the strategy built one.
    pub image: Option<ImageBuildResult>,
    /// Containers updated in place.
    pub updated_containers: Vec<ContainerRef>,
}

impl BuildOutcome {
    /// Create an outcome with no image and no in-place updates.
    #[must_use]
    pub const fn new(strategy: &'static str, target: TargetId) -> Self {
        Self {
            strategy,
            target,
            image: None,
            updated_containers: Vec::new(),
        }
    }
}
