//! Cluster access used by the remote-exec and sidecar updaters.
//!
//! [`ClusterClient`] is the seam between the update protocol and the
//! cluster API. The production implementation, [`KubectlClient`], shells
//! out to `kubectl`; tests substitute recording doubles.

mod env;
mod kubectl;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

pub use env::ClusterEnv;
pub use kubectl::KubectlClient;

use crate::model::ContainerRef;
use crate::output::OutputSink;
use crate::runtime::ContainerRuntime;

/// Failure of a cluster call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The remote command ran and exited with a non-zero status.
    #[error("remote command exited with code {code}")]
    Exit {
        /// The exit code of the remote command.
        code: i64,
    },

    /// The cluster could not be reached or rejected the call.
    #[error("{message}")]
    Transport {
        /// A description of the failure.
        message: String,
    },
}

/// One command to run inside a pod container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodExecRequest {
    /// Pod name.
    pub pod: String,
    /// Container name within the pod.
    pub container: String,
    /// Namespace of the pod.
    pub namespace: String,
    /// Argument vector to run.
    pub argv: Vec<String>,
}

impl PodExecRequest {
    /// Build a request targeting `container`.
    #[must_use]
    pub fn new(container: &ContainerRef, argv: Vec<String>) -> Self {
        Self {
            pod: String::from(container.pod_id()),
            container: String::from(container.container_name()),
            namespace: String::from(container.namespace()),
            argv,
        }
    }
}

/// Boxed future returned by [`ClusterClient::exec`].
pub type ClusterExecFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ClusterError>> + Send + 'a>>;

/// Boxed future returned by [`ClusterClient::node_container_runtime`].
pub type NodeRuntimeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerRuntime, ClusterError>> + Send + 'a>>;

/// Boxed future returned by [`ClusterClient::container_running`].
pub type ContainerRunningFuture<'a> =
    Pin<Box<dyn Future<Output = Result<bool, ClusterError>> + Send + 'a>>;

/// Behaviour required from the cluster API.
pub trait ClusterClient: Send + Sync {
    /// Run `request.argv` in the pod container, feeding `stdin` and writing
    /// combined output to `output`.
    fn exec<'a>(
        &'a self,
        request: &'a PodExecRequest,
        stdin: Vec<u8>,
        output: OutputSink<'a>,
    ) -> ClusterExecFuture<'a>;

    /// Report the container runtime of the cluster's nodes.
    fn node_container_runtime(&self) -> NodeRuntimeFuture<'_>;

    /// Report whether `container` is still the running instance in its pod.
    fn container_running<'a>(&'a self, container: &'a ContainerRef) -> ContainerRunningFuture<'a>;
}
