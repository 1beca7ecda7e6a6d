//! Classification of the active Kubernetes context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of cluster the active kubeconfig context points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterEnv {
    /// No cluster context is active; only compose and local targets run.
    #[default]
    None,
    /// Docker Desktop's bundled Kubernetes.
    DockerDesktop,
    /// A Minikube cluster.
    Minikube,
    /// A `MicroK8s` cluster.
    #[serde(rename = "microk8s")]
    MicroK8s,
    /// A kind (Kubernetes in Docker) cluster.
    Kind,
    /// A k3d cluster.
    K3d,
    /// A Google Kubernetes Engine cluster.
    Gke,
    /// Any other cluster.
    Unknown,
}

impl ClusterEnv {
    /// Classify a kubeconfig context name.
    ///
    /// `None` or an empty name means no cluster is in use.
    #[must_use]
    pub fn from_context(context: Option<&str>) -> Self {
        let Some(name) = context.map(str::trim).filter(|name| !name.is_empty()) else {
            return Self::None;
        };
        match name {
            "docker-desktop" | "docker-for-desktop" => Self::DockerDesktop,
            "minikube" => Self::Minikube,
            "microk8s" => Self::MicroK8s,
            _ if name.starts_with("kind-") => Self::Kind,
            _ if name.starts_with("k3d-") => Self::K3d,
            _ if name.starts_with("gke_") => Self::Gke,
            _ => Self::Unknown,
        }
    }

    /// Whether a cluster is in use at all.
    #[must_use]
    pub const fn is_cluster(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether images built on the local daemon are visible to the cluster
    /// without a registry push.
    #[must_use]
    pub const fn shares_local_daemon(self) -> bool {
        matches!(self, Self::DockerDesktop | Self::Minikube | Self::MicroK8s)
    }
}

impl fmt::Display for ClusterEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::DockerDesktop => "docker-desktop",
            Self::Minikube => "minikube",
            Self::MicroK8s => "microk8s",
            Self::Kind => "kind",
            Self::K3d => "k3d",
            Self::Gke => "gke",
            Self::Unknown => "unknown",
        })
    }
}
