//! Container runtime capability probe.
//!
//! Detects which mutation transports the session can use: the node
//! container runtime of the connected cluster and whether the local
//! container daemon answers pings.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cluster::ClusterClient;
use crate::engine::{ContainerLifecycle, EngineConnector};

/// Container runtime reported by the cluster's nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Docker (dockershim or cri-dockerd).
    Docker,
    /// containerd.
    Containerd,
    /// CRI-O.
    CriO,
    /// Anything else, including an unreadable version string.
    Unknown,
}

impl ContainerRuntime {
    /// Parse a node `containerRuntimeVersion` such as `docker://24.0.7`.
    #[must_use]
    pub fn from_runtime_version(version: &str) -> Self {
        let scheme = version
            .trim()
            .split_once("://")
            .map_or("", |(scheme, _)| scheme);
        match scheme {
            "docker" => Self::Docker,
            "containerd" => Self::Containerd,
            "cri-o" => Self::CriO,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Docker => "docker",
            Self::Containerd => "containerd",
            Self::CriO => "cri-o",
            Self::Unknown => "unknown",
        })
    }
}

/// What the environment supports, probed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCapabilities {
    cluster_runtime: Option<ContainerRuntime>,
    daemon_reachable: bool,
    sidecar_available: bool,
}

impl RuntimeCapabilities {
    /// Create a capability set.
    #[must_use]
    pub const fn new(
        cluster_runtime: Option<ContainerRuntime>,
        daemon_reachable: bool,
        sidecar_available: bool,
    ) -> Self {
        Self {
            cluster_runtime,
            daemon_reachable,
            sidecar_available,
        }
    }

    /// Node runtime of the connected cluster; `None` without a cluster.
    #[must_use]
    pub const fn cluster_runtime(&self) -> Option<ContainerRuntime> {
        self.cluster_runtime
    }

    /// Whether the local container daemon answered a ping.
    #[must_use]
    pub const fn daemon_reachable(&self) -> bool {
        self.daemon_reachable
    }

    /// Whether a sidecar proxy connector was supplied.
    #[must_use]
    pub const fn sidecar_available(&self) -> bool {
        self.sidecar_available
    }
}

/// Probe settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Upper bound on the daemon ping.
    pub daemon_timeout: Duration,
    /// Upper bound on the node runtime query.
    pub cluster_timeout: Duration,
}

/// Probe the environment.
///
/// Probe failures are never fatal: an unreachable daemon reports
/// `daemon_reachable = false` and an unreadable node runtime reports
/// [`ContainerRuntime::Unknown`].
pub async fn probe_capabilities(
    daemon: Option<&dyn ContainerLifecycle>,
    cluster: Option<&dyn ClusterClient>,
    sidecar_available: bool,
    settings: ProbeSettings,
) -> RuntimeCapabilities {
    let daemon_reachable = match daemon {
        Some(client) => {
            match EngineConnector::health_check_async(client, settings.daemon_timeout).await {
                Ok(()) => true,
                Err(error) => {
                    debug!(%error, "container daemon is not reachable");
                    false
                }
            }
        }
        None => false,
    };

    let cluster_runtime = match cluster {
        Some(client) => Some(
            match tokio::time::timeout(settings.cluster_timeout, client.node_container_runtime())
                .await
            {
                Ok(Ok(runtime)) => runtime,
                Ok(Err(error)) => {
                    warn!(%error, "could not detect the cluster's container runtime");
                    ContainerRuntime::Unknown
                }
                Err(_) => {
                    warn!("timed out detecting the cluster's container runtime");
                    ContainerRuntime::Unknown
                }
            },
        ),
        None => None,
    };

    let capabilities =
        RuntimeCapabilities::new(cluster_runtime, daemon_reachable, sidecar_available);
    info!(
        daemon_reachable,
        cluster_runtime = %cluster_runtime.map_or_else(|| String::from("none"), |r| r.to_string()),
        sidecar_available,
        "runtime capabilities probed"
    );
    capabilities
}
