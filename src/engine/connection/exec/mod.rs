//! Command execution inside running containers.
//!
//! Wraps the Bollard exec lifecycle behind a trait seam so the direct
//! updater can be unit-tested without a live daemon. Output is drained into
//! a caller-supplied sink and the exit code is read from exec inspect.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::{Docker, errors::Error as BollardError};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

use super::EngineConnector;
use crate::error::{ConfigError, ContainerError, LiveswapError};
use crate::output::OutputSink;

const EXEC_INSPECT_POLL_INTERVAL_MS: u64 = 100;

/// How long an exec may keep reporting `running` after its output closed.
const EXEC_EXIT_WAIT: Duration = Duration::from_secs(30);

/// Boxed future type returned by [`ContainerExecClient::create_exec`].
pub type CreateExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::start_exec`].
pub type StartExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StartExecResults, BollardError>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::inspect_exec`].
pub type InspectExecFuture<'a> = Pin<
    Box<
        dyn Future<Output = Result<bollard::models::ExecInspectResponse, BollardError>> + Send + 'a,
    >,
>;

/// Behaviour required to run and inspect exec sessions.
pub trait ContainerExecClient: Send + Sync {
    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_>;

    /// Start a previously created exec session.
    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;

    /// Inspect an exec session for running status and exit code.
    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
}

impl ContainerExecClient for Docker {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }

    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::inspect_exec(self, &exec_id_owned).await })
    }
}

/// Parameters required to run a command in a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    container_id: String,
    command: Vec<String>,
}

impl ExecRequest {
    /// Create a new command execution request.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` when `container_id` or
    /// `command` is empty, and `ConfigError::InvalidValue` when the
    /// executable is blank.
    pub fn new(container_id: impl Into<String>, command: Vec<String>) -> Result<Self, LiveswapError> {
        let container_id_value = container_id.into();
        let trimmed = container_id_value.trim();
        if trimmed.is_empty() {
            return Err(LiveswapError::from(ConfigError::MissingRequired {
                field: String::from("container"),
            }));
        }
        let Some(executable) = command.first() else {
            return Err(LiveswapError::from(ConfigError::MissingRequired {
                field: String::from("command"),
            }));
        };
        if executable.trim().is_empty() {
            return Err(LiveswapError::from(ConfigError::InvalidValue {
                field: String::from("command"),
                reason: String::from("command executable must not be empty"),
            }));
        }

        Ok(Self {
            container_id: String::from(trimmed),
            command,
        })
    }

    /// Return target container identifier.
    #[must_use]
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Return command argv entries.
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

/// Outcome of a container command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    exec_id: String,
    exit_code: i64,
}

impl ExecResult {
    /// Return daemon-assigned exec identifier.
    #[must_use]
    pub fn exec_id(&self) -> &str {
        &self.exec_id
    }

    /// Return command exit code captured from exec inspect.
    #[must_use]
    pub const fn exit_code(&self) -> i64 {
        self.exit_code
    }
}

impl EngineConnector {
    /// Run a command to completion, streaming its output into `output`.
    ///
    /// A non-zero exit code is returned in the result, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ExecFailed` when the exec session cannot be
    /// created, started, streamed or inspected.
    pub async fn exec_async<C: ContainerExecClient + ?Sized>(
        client: &C,
        request: &ExecRequest,
        output: OutputSink<'_>,
    ) -> Result<ExecResult, LiveswapError> {
        let container_id = request.container_id();
        let create_result = client
            .create_exec(container_id, build_create_exec_options(request))
            .await
            .map_err(|error| exec_failed(container_id, format!("create exec failed: {error}")))?;

        let exec_id = create_result.id;
        let start_result = client
            .start_exec(&exec_id, Some(build_start_exec_options()))
            .await
            .map_err(|error| exec_failed(container_id, format!("start exec failed: {error}")))?;

        let StartExecResults::Attached {
            output: mut stream, ..
        } = start_result
        else {
            return Err(exec_failed(
                container_id,
                "daemon returned detached start result for an attached exec",
            ));
        };

        while let Some(chunk) = stream.next().await {
            let message = match chunk
                .map_err(|error| exec_failed(container_id, format!("exec stream failed: {error}")))?
            {
                LogOutput::StdOut { message }
                | LogOutput::StdErr { message }
                | LogOutput::Console { message }
                | LogOutput::StdIn { message } => message,
            };
            output.write_all(&message).await.map_err(|error| {
                exec_failed(container_id, format!("failed forwarding output: {error}"))
            })?;
        }
        output.flush().await.map_err(|error| {
            exec_failed(container_id, format!("failed flushing output: {error}"))
        })?;

        let exit_code =
            wait_for_exit_code_async(client, container_id, &exec_id, EXEC_EXIT_WAIT).await?;
        Ok(ExecResult { exec_id, exit_code })
    }
}

async fn wait_for_exit_code_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    exec_id: &str,
    limit: Duration,
) -> Result<i64, LiveswapError> {
    let poll = async {
        loop {
            let inspect = client.inspect_exec(exec_id).await.map_err(|error| {
                exec_failed(container_id, format!("inspect exec failed: {error}"))
            })?;

            if inspect.running.unwrap_or(false) {
                sleep(Duration::from_millis(EXEC_INSPECT_POLL_INTERVAL_MS)).await;
                continue;
            }

            return inspect.exit_code.ok_or_else(|| {
                exec_failed(
                    container_id,
                    format!("exec session '{exec_id}' completed without an exit code"),
                )
            });
        }
    };

    timeout(limit, poll).await.unwrap_or_else(|_| {
        Err(exec_failed(
            container_id,
            format!(
                "exec session '{exec_id}' still running {}ms after its output closed",
                limit.as_millis()
            ),
        ))
    })
}

fn build_create_exec_options(request: &ExecRequest) -> CreateExecOptions<String> {
    CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(false),
        cmd: Some(request.command().to_vec()),
        ..CreateExecOptions::default()
    }
}

const fn build_start_exec_options() -> StartExecOptions {
    StartExecOptions {
        detach: false,
        tty: false,
        output_capacity: None,
    }
}

fn exec_failed(container_id: &str, message: impl Into<String>) -> LiveswapError {
    LiveswapError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}
