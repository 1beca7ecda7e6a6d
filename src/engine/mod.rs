//! Container daemon connection and native primitives.
//!
//! The socket endpoint is resolved through a priority-based fallback chain:
//!
//! 1. CLI argument (`--engine-socket`)
//! 2. Config file (`engine_socket` in TOML)
//! 3. `LIVESWAP_ENGINE_SOCKET` environment variable
//! 4. `DOCKER_HOST` environment variable
//! 5. `CONTAINER_HOST` environment variable
//! 6. Platform default (`/var/run/docker.sock` on Unix)

mod connection;

pub use connection::{
    ContainerExecClient, ContainerLifecycle, ContainerUploader, CreateExecFuture, EngineConnector,
    ExecRequest, ExecResult, InspectContainerFuture, InspectExecFuture, PingFuture,
    RestartContainerFuture, SocketResolver, StartExecFuture, UploadToContainerFuture,
};

/// Everything the direct updater needs from a container daemon.
pub trait DaemonClient: ContainerExecClient + ContainerUploader + ContainerLifecycle {}

impl<T> DaemonClient for T where T: ContainerExecClient + ContainerUploader + ContainerLifecycle {}
