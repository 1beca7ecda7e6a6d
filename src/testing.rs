//! Recording transport doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, ContainerState, ExecInspectResponse};
use bollard::query_parameters::UploadToContainerOptions;
use futures_util::stream;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::cluster::{
    ClusterClient, ClusterError, ClusterExecFuture, ContainerRunningFuture, NodeRuntimeFuture,
    PodExecRequest,
};
use crate::engine::{
    ContainerExecClient, ContainerLifecycle, ContainerUploader, CreateExecFuture,
    InspectContainerFuture, InspectExecFuture, PingFuture, RestartContainerFuture,
    StartExecFuture, UploadToContainerFuture,
};
use crate::model::ContainerRef;
use crate::output::OutputSink;
use crate::runtime::ContainerRuntime;

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One observed transport call, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Exec { argv: Vec<String>, stdin: Vec<u8> },
    Upload { container_id: String, bytes: Vec<u8> },
    Restart { container_id: String },
    Revalidate { container: String },
    NodeRuntime,
}

/// Cluster client double with scripted exec outcomes.
///
/// Execs beyond the scripted queue succeed.
pub(crate) struct FakeCluster {
    calls: Mutex<Vec<Call>>,
    exec_results: Mutex<VecDeque<Result<(), ClusterError>>>,
    runtime: Result<ContainerRuntime, ClusterError>,
    running: Result<bool, ClusterError>,
    cancel_after_execs: Option<(usize, CancellationToken)>,
}

impl FakeCluster {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exec_results: Mutex::new(VecDeque::new()),
            runtime: Ok(ContainerRuntime::Docker),
            running: Ok(true),
            cancel_after_execs: None,
        }
    }

    pub(crate) fn with_exec_results(self, results: Vec<Result<(), ClusterError>>) -> Self {
        *lock(&self.exec_results) = results.into();
        self
    }

    pub(crate) fn with_runtime(mut self, runtime: Result<ContainerRuntime, ClusterError>) -> Self {
        self.runtime = runtime;
        self
    }

    pub(crate) fn with_running(mut self, running: Result<bool, ClusterError>) -> Self {
        self.running = running;
        self
    }

    /// Cancel `token` once `count` execs have completed.
    pub(crate) fn cancelling_after(mut self, count: usize, token: CancellationToken) -> Self {
        self.cancel_after_execs = Some((count, token));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub(crate) fn exec_argvs(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Exec { argv, .. } => Some(argv),
                _ => None,
            })
            .collect()
    }

    fn exec_count(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, Call::Exec { .. }))
            .count()
    }
}

impl ClusterClient for FakeCluster {
    fn exec<'a>(
        &'a self,
        request: &'a PodExecRequest,
        stdin: Vec<u8>,
        output: OutputSink<'a>,
    ) -> ClusterExecFuture<'a> {
        Box::pin(async move {
            lock(&self.calls).push(Call::Exec {
                argv: request.argv.clone(),
                stdin,
            });
            let result = lock(&self.exec_results).pop_front().unwrap_or(Ok(()));
            let line = format!("ran {}\n", request.argv.join(" "));
            output
                .write_all(line.as_bytes())
                .await
                .map_err(|error| ClusterError::Transport {
                    message: error.to_string(),
                })?;
            if let Some((count, token)) = &self.cancel_after_execs {
                if self.exec_count() >= *count {
                    token.cancel();
                }
            }
            result
        })
    }

    fn node_container_runtime(&self) -> NodeRuntimeFuture<'_> {
        lock(&self.calls).push(Call::NodeRuntime);
        let result = self.runtime.clone();
        Box::pin(async move { result })
    }

    fn container_running<'a>(&'a self, container: &'a ContainerRef) -> ContainerRunningFuture<'a> {
        lock(&self.calls).push(Call::Revalidate {
            container: container.to_string(),
        });
        let result = self.running.clone();
        Box::pin(async move { result })
    }
}

/// Container daemon double speaking the bollard-shaped traits.
///
/// Exec exit codes are consumed in order; execs beyond the queue exit 0.
pub(crate) struct FakeDaemon {
    calls: Mutex<Vec<Call>>,
    pending_execs: Mutex<Vec<Vec<String>>>,
    exit_codes: Mutex<VecDeque<i64>>,
    upload_error: Option<String>,
    running: bool,
}

impl FakeDaemon {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            pending_execs: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(VecDeque::new()),
            upload_error: None,
            running: true,
        }
    }

    pub(crate) fn with_exit_codes(self, codes: Vec<i64>) -> Self {
        *lock(&self.exit_codes) = codes.into();
        self
    }

    pub(crate) fn failing_uploads(mut self, message: &str) -> Self {
        self.upload_error = Some(String::from(message));
        self
    }

    pub(crate) const fn stopped(mut self) -> Self {
        self.running = false;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }
}

impl ContainerExecClient for FakeDaemon {
    fn create_exec(
        &self,
        _container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let argv = options.cmd.unwrap_or_default();
        let mut pending = lock(&self.pending_execs);
        pending.push(argv);
        let id = format!("exec-{}", pending.len() - 1);
        Box::pin(async move { Ok(CreateExecResults { id }) })
    }

    fn start_exec(&self, exec_id: &str, _options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let argv = exec_argv(&lock(&self.pending_execs), exec_id);
        let line = format!("ran {}\n", argv.join(" "));
        lock(&self.calls).push(Call::Exec {
            argv,
            stdin: Vec::new(),
        });
        Box::pin(async move {
            let chunks = vec![Ok(LogOutput::StdOut {
                message: line.into_bytes().into(),
            })];
            Ok(StartExecResults::Attached {
                output: Box::pin(stream::iter(chunks)),
                input: Box::pin(tokio::io::sink()),
            })
        })
    }

    fn inspect_exec(&self, _exec_id: &str) -> InspectExecFuture<'_> {
        let exit_code = lock(&self.exit_codes).pop_front().unwrap_or(0);
        Box::pin(async move {
            Ok(ExecInspectResponse {
                running: Some(false),
                exit_code: Some(exit_code),
                ..ExecInspectResponse::default()
            })
        })
    }
}

fn exec_argv(pending: &[Vec<String>], exec_id: &str) -> Vec<String> {
    exec_id
        .strip_prefix("exec-")
        .and_then(|index| index.parse::<usize>().ok())
        .and_then(|index| pending.get(index))
        .cloned()
        .unwrap_or_default()
}

impl ContainerUploader for FakeDaemon {
    fn upload_to_container(
        &self,
        container_id: &str,
        _options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> UploadToContainerFuture<'_> {
        lock(&self.calls).push(Call::Upload {
            container_id: String::from(container_id),
            bytes: archive_bytes,
        });
        let failure = self.upload_error.clone();
        Box::pin(async move {
            failure.map_or(Ok(()), |message| {
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 500,
                    message,
                })
            })
        })
    }
}

impl ContainerLifecycle for FakeDaemon {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        lock(&self.calls).push(Call::Revalidate {
            container: String::from(container_id),
        });
        let running = self.running;
        Box::pin(async move {
            Ok(ContainerInspectResponse {
                state: Some(ContainerState {
                    running: Some(running),
                    ..ContainerState::default()
                }),
                ..ContainerInspectResponse::default()
            })
        })
    }

    fn restart_container(&self, container_id: &str) -> RestartContainerFuture<'_> {
        lock(&self.calls).push(Call::Restart {
            container_id: String::from(container_id),
        });
        Box::pin(async { Ok(()) })
    }
}

pub(crate) fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| String::from(*word)).collect()
}
