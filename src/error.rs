//! Semantic error types for liveswap.
//!
//! Errors are modelled as semantic enums (via `thiserror`) so callers can
//! inspect the failure kind and decide whether a later cycle should retry,
//! while the binary converts them to `eyre::Report` at the boundary.
//!
//! Every error exposes [`ErrorKind`] through a `kind()` accessor. Wrapping an
//! error with attempt context (container, command index, strategy, target)
//! never changes its kind.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::mode::{UpdateMode, UpdaterKind};
use crate::model::{ContainerRef, TargetId};

/// Coarse classification shared by every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested configuration cannot be satisfied. Fatal, user-facing.
    Configuration,
    /// The transport cannot honour the requested semantics. Never retried.
    Capability,
    /// Connectivity failure. Retried by a later cycle, never internally.
    Transport,
    /// A user-supplied command exited non-zero. Surfaced, not retried.
    Command,
    /// The cycle was cancelled between steps.
    Cancelled,
    /// An external build, push, apply or host command failed.
    Build,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::Capability => "capability",
            Self::Transport => "transport",
            Self::Command => "command",
            Self::Cancelled => "cancelled",
            Self::Build => "build",
        };
        f.write_str(label)
    }
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The requested update mode cannot work in the detected environment.
    #[error("update mode '{requested}' cannot be used here: {reason}")]
    UnsatisfiableUpdateMode {
        /// The mode the user asked for.
        requested: UpdateMode,
        /// What makes the mode impossible, phrased as a corrective hint.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while talking to the local container daemon.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Failed to create a tokio runtime for a synchronous wrapper.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime failure.
        message: String,
    },

    /// Failed to upload an archive to a container.
    #[error("failed to upload files to container '{container_id}': {message}")]
    UploadFailed {
        /// The ID of the target container.
        container_id: String,
        /// A description of the upload failure.
        message: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// The step of the update protocol an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStage {
    /// Checking that the container is still running.
    Revalidate,
    /// Opening or reusing a transport session.
    Session,
    /// Removing `files_to_delete`.
    Delete,
    /// Unpacking the archive into the container root.
    Copy,
    /// Running the command at this zero-based index.
    Run(usize),
    /// Restarting the container after the update.
    Restart,
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revalidate => f.write_str("revalidating container"),
            Self::Session => f.write_str("opening update session"),
            Self::Delete => f.write_str("deleting files"),
            Self::Copy => f.write_str("copying archive"),
            Self::Run(index) => write!(f, "running command {index}"),
            Self::Restart => f.write_str("restarting container"),
        }
    }
}

/// Errors raised while applying one update to one container.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The transport failed to reach the container or its runtime.
    #[error("transport failure while {stage} in {container}: {message}")]
    Transport {
        /// The container being updated.
        container: ContainerRef,
        /// The protocol step that failed.
        stage: UpdateStage,
        /// A description of the transport failure.
        message: String,
    },

    /// The updater cannot honour the requested semantics.
    #[error("{updater} updater cannot apply this update: {message}")]
    Capability {
        /// The updater that refused.
        updater: UpdaterKind,
        /// Why the update was refused.
        message: String,
    },

    /// A user command exited with a non-zero status.
    #[error(
        "command {index} `{}` failed with exit code {exit_code} in {container}",
        .argv.join(" ")
    )]
    Command {
        /// Zero-based index of the failing command.
        index: usize,
        /// The argument vector of the failing command.
        argv: Vec<String>,
        /// The exit code reported by the transport.
        exit_code: i64,
        /// The container the command ran in.
        container: ContainerRef,
    },

    /// The update was cancelled before this step started.
    #[error("update of {container} cancelled before {stage}")]
    Cancelled {
        /// The container being updated.
        container: ContainerRef,
        /// The step that did not start.
        stage: UpdateStage,
    },

    /// Another update to the same container is still in flight.
    #[error("an update to {container} is already in flight")]
    ContainerBusy {
        /// The contended container.
        container: ContainerRef,
    },
}

impl UpdateError {
    /// Return the failure kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::ContainerBusy { .. } => ErrorKind::Transport,
            Self::Capability { .. } => ErrorKind::Capability,
            Self::Command { .. } => ErrorKind::Command,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Errors raised by a build-and-deploy strategy.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A single-container live update failed.
    #[error("live update of {container} failed: {source}")]
    Update {
        /// The container whose update failed.
        container: ContainerRef,
        /// The underlying update failure.
        #[source]
        source: UpdateError,
    },

    /// A multi-container live update left the target in a mixed state.
    #[error(
        "live update of {target} left {} of {} containers updated: {source}",
        .updated.len(),
        .updated.len() + .failed.len()
    )]
    LiveUpdate {
        /// The target being updated.
        target: TargetId,
        /// Containers that received the full update.
        updated: Vec<ContainerRef>,
        /// Containers whose commands failed.
        failed: Vec<ContainerRef>,
        /// The first command failure observed.
        #[source]
        source: UpdateError,
    },

    /// The image builder failed.
    #[error("image build for {target} failed: {message}")]
    ImageBuild {
        /// The target being built.
        target: TargetId,
        /// A description of the build failure.
        message: String,
    },

    /// Pushing the built image failed.
    #[error("pushing image '{image_ref}' failed: {message}")]
    ImagePush {
        /// The image that could not be pushed.
        image_ref: String,
        /// A description of the push failure.
        message: String,
    },

    /// Applying the deployment manifest failed.
    #[error("applying manifest '{manifest}' failed: {message}")]
    ManifestApply {
        /// The manifest name.
        manifest: String,
        /// A description of the apply failure.
        message: String,
    },

    /// Bringing up a compose service failed.
    #[error("compose up for service '{service}' failed: {message}")]
    ComposeUp {
        /// The compose service name.
        service: String,
        /// A description of the failure.
        message: String,
    },

    /// The host command of a local target could not be spawned.
    #[error("failed to start local command `{command}`: {message}")]
    LocalSpawn {
        /// The command line.
        command: String,
        /// A description of the spawn failure.
        message: String,
    },

    /// The host command of a local target exited non-zero.
    #[error("local command `{command}` exited with {exit_code:?}")]
    LocalCommand {
        /// The command line.
        command: String,
        /// The exit code, absent when the process was killed by a signal.
        exit_code: Option<i32>,
    },

    /// The build was cancelled before it started mutating anything.
    #[error("build of {target} cancelled")]
    Cancelled {
        /// The target being built.
        target: TargetId,
    },
}

impl BuildError {
    /// Return the failure kind, preserved from any wrapped update error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Update { source, .. } | Self::LiveUpdate { source, .. } => source.kind(),
            Self::LocalCommand { .. } => ErrorKind::Command,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::ImageBuild { .. }
            | Self::ImagePush { .. }
            | Self::ManifestApply { .. }
            | Self::ComposeUp { .. }
            | Self::LocalSpawn { .. } => ErrorKind::Build,
        }
    }
}

/// Errors surfaced by the composite dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A strategy accepted the target and failed.
    #[error("{strategy} failed for {target}: {source}")]
    Strategy {
        /// The name of the failing strategy.
        strategy: &'static str,
        /// The target being built.
        target: TargetId,
        /// The strategy failure.
        #[source]
        source: BuildError,
    },

    /// No strategy in the build order accepted the target.
    #[error("no build strategy can handle {target} (tried: {})", .tried.join(", "))]
    NoEligibleStrategy {
        /// The target that could not be built.
        target: TargetId,
        /// Strategies considered, in order.
        tried: Vec<&'static str>,
    },

    /// The cycle was cancelled between strategy attempts.
    #[error("build of {target} cancelled")]
    Cancelled {
        /// The target being built.
        target: TargetId,
    },
}

impl DispatchError {
    /// Return the failure kind, preserved from the strategy failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Strategy { source, .. } => source.kind(),
            Self::NoEligibleStrategy { .. } => ErrorKind::Configuration,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Errors that can occur during host filesystem operations.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

/// Top-level error type for liveswap.
///
/// Aggregates all domain-specific errors. At the application boundary
/// (`main.rs`) these are converted to `eyre::Report`.
#[derive(Debug, Error)]
pub enum LiveswapError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred talking to the container daemon.
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An error occurred applying an update.
    #[error(transparent)]
    Update(#[from] UpdateError),

    /// An error occurred in a build strategy.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An error occurred dispatching a target.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// An error occurred during filesystem operations.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

impl LiveswapError {
    /// Return the failure kind of the wrapped error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Container(_) | Self::Filesystem(_) => ErrorKind::Transport,
            Self::Update(error) => error.kind(),
            Self::Build(error) => error.kind(),
            Self::Dispatch(error) => error.kind(),
        }
    }
}

/// A specialised `Result` type for liveswap operations.
pub type Result<T> = std::result::Result<T, LiveswapError>;
