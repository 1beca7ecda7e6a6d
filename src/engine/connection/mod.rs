//! Socket resolution and container daemon connection.
//!
//! Resolves the daemon endpoint from configuration, environment variables,
//! or the platform default, and connects with Bollard. The submodules wrap
//! the daemon calls the direct updater needs behind small trait seams.

mod error_classification;
mod exec;
mod health_check;
mod lifecycle;
mod upload;

use bollard::Docker;

use crate::error::{ContainerError, LiveswapError};
use error_classification::classify_connection_error;

pub use exec::{
    ContainerExecClient, CreateExecFuture, ExecRequest, ExecResult, InspectExecFuture,
    StartExecFuture,
};
pub use lifecycle::{
    ContainerLifecycle, InspectContainerFuture, PingFuture, RestartContainerFuture,
};
pub use upload::{ContainerUploader, UploadToContainerFuture};

/// Environment variable names checked after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST"];

/// Connection timeout in seconds for daemon API calls.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Default socket path for Unix platforms.
#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

/// Default socket path for Windows platforms.
#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Resolves daemon socket endpoints from environment variables.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use liveswap::engine::SocketResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = SocketResolver::new(&env);
/// let socket = resolver.resolve_from_env();
/// ```
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a new socket resolver with the given environment provider.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Resolves the socket from `DOCKER_HOST`, then `CONTAINER_HOST`.
    ///
    /// Empty values are skipped.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default socket path.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// Classifies socket endpoint types for connection handling.
enum SocketType {
    /// Unix socket or Windows named pipe with explicit scheme.
    Socket,
    /// HTTP, HTTPS, or TCP endpoint (TCP is rewritten to HTTP).
    Http,
    /// Bare path without scheme prefix.
    BarePath,
}

impl SocketType {
    fn classify(socket: &str) -> Self {
        if socket.starts_with("unix://") || socket.starts_with("npipe://") {
            Self::Socket
        } else if ["tcp://", "http://", "https://"]
            .iter()
            .any(|scheme| socket.starts_with(scheme))
        {
            Self::Http
        } else {
            Self::BarePath
        }
    }
}

/// Connects to the container daemon and drives its native primitives.
pub struct EngineConnector;

impl EngineConnector {
    /// Connect to the daemon at `socket`.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://` (treated as HTTP), `http://`,
    /// `https://`, and bare paths. Bare paths starting with `\\` or `//` are
    /// named pipes; any other bare path is a Unix socket.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound` or
    /// `ContainerError::PermissionDenied` when the socket path is unusable,
    /// and `ContainerError::ConnectionFailed` otherwise.
    pub fn connect(socket: &str) -> Result<Docker, LiveswapError> {
        let (socket_uri, result) = match SocketType::classify(socket) {
            SocketType::Socket => (
                socket.to_owned(),
                Docker::connect_with_socket(
                    socket,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                ),
            ),
            SocketType::Http => {
                let http_socket = socket.replacen("tcp://", "http://", 1);
                let result = Docker::connect_with_http(
                    &http_socket,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                );
                (http_socket, result)
            }
            SocketType::BarePath => {
                let socket_uri = Self::normalize_bare_path(socket);
                let result = Docker::connect_with_socket(
                    &socket_uri,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                );
                (socket_uri, result)
            }
        };

        result.map_err(|error| {
            LiveswapError::from(classify_connection_error(&error, &socket_uri))
        })
    }

    fn normalize_bare_path(path: &str) -> String {
        if path.starts_with("\\\\") || path.starts_with("//") {
            format!("npipe://{path}")
        } else {
            format!("unix://{path}")
        }
    }

    /// Connect using the configured socket or the environment fallbacks.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::connect`].
    pub fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<Docker, LiveswapError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        Self::connect(&socket)
    }

    /// Resolve the socket endpoint without connecting.
    ///
    /// Resolution order: `config_socket` (CLI, file or
    /// `LIVESWAP_ENGINE_SOCKET`), then `DOCKER_HOST` and `CONTAINER_HOST`,
    /// then the platform default.
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }

    /// Create a dedicated runtime for the synchronous wrappers.
    pub(crate) fn create_runtime() -> Result<tokio::runtime::Runtime, LiveswapError> {
        tokio::runtime::Runtime::new().map_err(|e| {
            LiveswapError::from(ContainerError::RuntimeCreationFailed {
                message: e.to_string(),
            })
        })
    }
}
