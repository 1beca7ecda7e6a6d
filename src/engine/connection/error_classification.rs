//! Maps Bollard connection failures onto semantic `ContainerError` variants.

use std::io;
use std::path::Path;

use crate::error::ContainerError;

/// Strip `unix://` or `npipe://` to get the socket's filesystem path.
///
/// HTTP endpoints have no filesystem path.
fn socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

fn from_io_kind(kind: io::ErrorKind, path: Option<&Path>, message: String) -> ContainerError {
    match (kind, path) {
        (io::ErrorKind::PermissionDenied, Some(socket)) => ContainerError::PermissionDenied {
            path: socket.to_path_buf(),
        },
        (io::ErrorKind::NotFound, Some(socket)) => ContainerError::SocketNotFound {
            path: socket.to_path_buf(),
        },
        _ => ContainerError::ConnectionFailed { message },
    }
}

/// Classify a Bollard connection error for `socket_uri`.
pub(super) fn classify_connection_error(
    error: &bollard::errors::Error,
    socket_uri: &str,
) -> ContainerError {
    let path = socket_path(socket_uri);
    let message = error.to_string();

    if let bollard::errors::Error::SocketNotFoundError(_) = error {
        if let Some(socket) = path {
            return ContainerError::SocketNotFound {
                path: socket.to_path_buf(),
            };
        }
    }
    if let bollard::errors::Error::IOError { err } = error {
        let kind = io_kind_in_chain(err).unwrap_or_else(|| err.kind());
        return from_io_kind(kind, path, message);
    }
    match io_kind_in_chain(error) {
        Some(kind) => from_io_kind(kind, path, message),
        None => ContainerError::ConnectionFailed { message },
    }
}

/// Walk the source chain for the first `io::Error`.
fn io_kind_in_chain(error: &dyn std::error::Error) -> Option<io::ErrorKind> {
    let mut current = error.source();
    while let Some(cause) = current {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
        current = cause.source();
    }
    None
}
