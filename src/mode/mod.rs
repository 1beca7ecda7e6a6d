//! Update-mode selection.
//!
//! The user requests an [`UpdateMode`]; [`resolve_update_mode`] combines it
//! with the detected cluster environment and runtime capabilities into a
//! [`ResolvedUpdateMode`] once per session. Explicit requests are honoured or
//! rejected with a configuration error, never silently substituted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cluster::ClusterEnv;
use crate::error::{ConfigError, LiveswapError};
use crate::runtime::{ContainerRuntime, RuntimeCapabilities};

/// Transport requested by `--update-mode container` or `--update-mode exec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerTransport {
    /// Talk to the container daemon directly.
    Daemon,
    /// Run remote commands through the cluster API.
    Exec,
}

/// Update mode requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UpdateMode {
    /// Pick the cheapest transport the environment supports.
    #[default]
    Auto,
    /// Never patch containers; always rebuild and redeploy.
    Image,
    /// Patch containers in place over the given transport.
    Container(ContainerTransport),
    /// Patch containers through the in-cluster sidecar proxy.
    Sync,
}

impl UpdateMode {
    /// Every accepted spelling, in display order.
    pub const VALID_VALUES: &'static [&'static str] = &["auto", "image", "container", "exec", "sync"];

    /// Return the configuration spelling of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Image => "image",
            Self::Container(ContainerTransport::Daemon) => "container",
            Self::Container(ContainerTransport::Exec) => "exec",
            Self::Sync => "sync",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "image" => Ok(Self::Image),
            "container" => Ok(Self::Container(ContainerTransport::Daemon)),
            "exec" | "kubectl-exec" => Ok(Self::Container(ContainerTransport::Exec)),
            "sync" | "synclet" => Ok(Self::Sync),
            other => Err(format!(
                "unknown update mode '{other}', expected one of: {}",
                Self::VALID_VALUES.join(", ")
            )),
        }
    }
}

impl TryFrom<String> for UpdateMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UpdateMode> for String {
    fn from(mode: UpdateMode) -> Self {
        Self::from(mode.as_str())
    }
}

/// The container updater variant serving live updates in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdaterKind {
    /// Native daemon copy and exec primitives.
    DirectDaemon,
    /// An in-cluster sidecar proxy session.
    SidecarProxy,
    /// One remote command invocation per protocol step.
    RemoteExec,
}

impl fmt::Display for UpdaterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectDaemon => "direct-daemon",
            Self::SidecarProxy => "sidecar-proxy",
            Self::RemoteExec => "remote-exec",
        })
    }
}

/// Concrete update policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedUpdateMode {
    /// Live updates are disabled; every change rebuilds the image.
    Image,
    /// Live updates go through the given updater.
    LiveUpdate(UpdaterKind),
}

impl ResolvedUpdateMode {
    /// Return the live-update transport, if live updates are enabled.
    #[must_use]
    pub const fn updater(self) -> Option<UpdaterKind> {
        match self {
            Self::Image => None,
            Self::LiveUpdate(kind) => Some(kind),
        }
    }

    /// Whether containers may be patched in place.
    #[must_use]
    pub const fn is_live_update(self) -> bool {
        matches!(self, Self::LiveUpdate(_))
    }
}

impl fmt::Display for ResolvedUpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::LiveUpdate(kind) => write!(f, "live-update via {kind}"),
        }
    }
}

/// Resolve the requested mode against the environment.
///
/// Pure and deterministic: identical inputs always produce the identical
/// result.
///
/// # Errors
///
/// Returns `ConfigError::UnsatisfiableUpdateMode` when an explicit request
/// cannot work with the detected environment.
pub fn resolve_update_mode(
    requested: UpdateMode,
    env: ClusterEnv,
    capabilities: &RuntimeCapabilities,
) -> Result<ResolvedUpdateMode, LiveswapError> {
    let resolved = match requested {
        UpdateMode::Image => ResolvedUpdateMode::Image,
        UpdateMode::Container(ContainerTransport::Daemon) => {
            check_daemon(env, capabilities).map_err(|reason| unsatisfiable(requested, reason))?;
            ResolvedUpdateMode::LiveUpdate(UpdaterKind::DirectDaemon)
        }
        UpdateMode::Container(ContainerTransport::Exec) => {
            check_cluster(env, requested).map_err(|reason| unsatisfiable(requested, reason))?;
            ResolvedUpdateMode::LiveUpdate(UpdaterKind::RemoteExec)
        }
        UpdateMode::Sync => {
            check_sidecar(env, capabilities).map_err(|reason| unsatisfiable(requested, reason))?;
            ResolvedUpdateMode::LiveUpdate(UpdaterKind::SidecarProxy)
        }
        UpdateMode::Auto => resolve_auto(env, capabilities),
    };

    info!(requested = %requested, env = %env, resolved = %resolved, "update mode resolved");
    Ok(resolved)
}

fn resolve_auto(env: ClusterEnv, capabilities: &RuntimeCapabilities) -> ResolvedUpdateMode {
    if check_daemon(env, capabilities).is_ok() {
        return ResolvedUpdateMode::LiveUpdate(UpdaterKind::DirectDaemon);
    }
    if check_sidecar(env, capabilities).is_ok() {
        return ResolvedUpdateMode::LiveUpdate(UpdaterKind::SidecarProxy);
    }
    if env.is_cluster() {
        warn!(
            "falling back to remote exec for live updates; steps that restart the container \
             are unsupported and will trigger a full rebuild"
        );
        return ResolvedUpdateMode::LiveUpdate(UpdaterKind::RemoteExec);
    }
    warn!("no live-update transport is available; every change will rebuild the image");
    ResolvedUpdateMode::Image
}

fn check_daemon(env: ClusterEnv, capabilities: &RuntimeCapabilities) -> Result<(), String> {
    if !capabilities.daemon_reachable() {
        return Err(String::from(
            "the container daemon is not reachable; check --engine-socket or DOCKER_HOST",
        ));
    }
    if !env.is_cluster() {
        return Ok(());
    }
    if !env.shares_local_daemon() {
        return Err(format!(
            "the '{env}' cluster does not share the local container daemon; direct updates only \
             work with local clusters like Docker Desktop or Minikube"
        ));
    }
    match capabilities.cluster_runtime() {
        Some(ContainerRuntime::Docker) => Ok(()),
        Some(runtime) => Err(format!(
            "the cluster's node runtime is {runtime}; direct updates need the docker runtime"
        )),
        None => Err(String::from("the cluster's node runtime could not be detected")),
    }
}

fn check_cluster(env: ClusterEnv, requested: UpdateMode) -> Result<(), String> {
    if env.is_cluster() {
        Ok(())
    } else {
        Err(format!(
            "'{requested}' updates run through a Kubernetes cluster and no cluster context is active"
        ))
    }
}

fn check_sidecar(env: ClusterEnv, capabilities: &RuntimeCapabilities) -> Result<(), String> {
    check_cluster(env, UpdateMode::Sync)?;
    match capabilities.cluster_runtime() {
        Some(ContainerRuntime::Docker) => {}
        Some(runtime) => {
            return Err(format!(
                "the cluster's node runtime is {runtime}; sidecar updates need the docker runtime"
            ));
        }
        None => return Err(String::from("the cluster's node runtime could not be detected")),
    }
    if capabilities.sidecar_available() {
        Ok(())
    } else {
        Err(String::from("no sidecar proxy connector is configured"))
    }
}

fn unsatisfiable(requested: UpdateMode, reason: String) -> LiveswapError {
    ConfigError::UnsatisfiableUpdateMode { requested, reason }.into()
}
