//! Domain types shared by the updaters, strategies and dispatcher.
//!
//! A [`Target`] is the long-lived deployable unit. Each cycle it carries the
//! containers currently backing it and, optionally, a [`LiveUpdateDelta`]
//! from which a single-use [`UpdateSpec`] is produced.

mod target;
mod update;

use std::fmt;

pub use target::{
    BuildOutcome, ComposeService, Deploy, ImageBuildResult, ImageTarget, LocalCommand, Manifest,
    RunningContainer, Target,
};
pub use update::{LiveUpdateDelta, UpdateSpec};

use crate::error::{ConfigError, LiveswapError};

/// Identifier of a deployable target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(String);

impl TargetId {
    /// Create a target identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime handle of one running container.
///
/// The handle is observed, not owned: the container can disappear between
/// resolution and use, so updaters revalidate it on every attempt.
/// Daemon-managed containers (compose services) carry an empty pod and
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pod_id: String,
    container_id: String,
    container_name: String,
    namespace: String,
}

impl ContainerRef {
    /// Create a handle to a container running in a cluster pod.
    #[must_use]
    pub fn new(
        pod_id: impl Into<String>,
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            pod_id: pod_id.into(),
            container_id: container_id.into(),
            container_name: container_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a handle to a container managed directly by the local daemon.
    #[must_use]
    pub fn daemon(container_id: impl Into<String>, container_name: impl Into<String>) -> Self {
        Self::new(String::new(), container_id, container_name, String::new())
    }

    /// Return the pod name.
    #[must_use]
    pub fn pod_id(&self) -> &str {
        &self.pod_id
    }

    /// Return the runtime container identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Return the container name within its pod.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Return the namespace of the pod.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the container lives in a cluster pod.
    #[must_use]
    pub fn in_pod(&self) -> bool {
        !self.pod_id.is_empty()
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.in_pod() {
            write!(
                f,
                "{}/{}/{}",
                self.namespace, self.pod_id, self.container_name
            )
        } else {
            f.write_str(&self.container_name)
        }
    }
}

/// A command to run inside a container, as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCommand {
    argv: Vec<String>,
}

impl ContainerCommand {
    /// Create a command from an argument vector.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `argv` is empty and
    /// `ConfigError::InvalidValue` when the executable is blank.
    pub fn new(argv: Vec<String>) -> Result<Self, LiveswapError> {
        let Some(executable) = argv.first() else {
            return Err(ConfigError::MissingRequired {
                field: String::from("command"),
            }
            .into());
        };
        if executable.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: String::from("command"),
                reason: String::from("command executable must not be empty"),
            }
            .into());
        }
        Ok(Self { argv })
    }

    /// Wrap a shell snippet as `sh -c <script>`.
    #[must_use]
    pub fn shell(script: impl Into<String>) -> Self {
        Self {
            argv: vec![String::from("sh"), String::from("-c"), script.into()],
        }
    }

    /// Return the argument vector.
    #[must_use]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl fmt::Display for ContainerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv.join(" "))
    }
}
