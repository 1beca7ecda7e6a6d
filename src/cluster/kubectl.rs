//! `kubectl`-backed cluster client.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use super::{
    ClusterClient, ClusterError, ClusterExecFuture, ContainerRunningFuture, NodeRuntimeFuture,
    PodExecRequest,
};
use crate::model::ContainerRef;
use crate::output::OutputSink;
use crate::runtime::ContainerRuntime;

/// Marker `kubectl exec` prints when the remote command, not kubectl, failed.
const REMOTE_EXIT_MARKER: &str = "command terminated with exit code ";

const OUTPUT_CHANNEL_CAPACITY: usize = 64;

const NODE_RUNTIME_JSONPATH: &str = "jsonpath={.items[0].status.nodeInfo.containerRuntimeVersion}";

const CONTAINER_STATUS_JSONPATH: &str = "jsonpath={range .status.containerStatuses[*]}{.name}{\"\\t\"}{.containerID}{\"\\t\"}{.state.running.startedAt}{\"\\n\"}{end}";

/// Cluster client that shells out to the `kubectl` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlClient {
    binary: String,
    context: Option<String>,
}

/// Captured result of a short-lived `kubectl` invocation.
struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl KubectlClient {
    /// Create a client invoking `binary` against the current context.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            context: None,
        }
    }

    /// Pin every invocation to a kubeconfig context.
    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|name| !name.trim().is_empty());
        self
    }

    /// Return the `kubectl` binary this client invokes.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Return the pinned kubeconfig context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Return the name of the active kubeconfig context.
    ///
    /// Returns `Ok(None)` when no context is configured.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Transport` when `kubectl` cannot be run.
    pub async fn current_context(&self) -> Result<Option<String>, ClusterError> {
        if let Some(context) = &self.context {
            return Ok(Some(context.clone()));
        }
        let captured = self.run_captured(&["config", "current-context"]).await?;
        if !captured.status.success() {
            debug!(stderr = %captured.stderr.trim(), "no current kubeconfig context");
            return Ok(None);
        }
        let name = captured.stdout.trim();
        Ok((!name.is_empty()).then(|| String::from(name)))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(context) = &self.context {
            command.arg("--context").arg(context);
        }
        command.kill_on_drop(true);
        command
    }

    async fn run_captured(&self, args: &[&str]) -> Result<Captured, ClusterError> {
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|error| self.spawn_failed(&error))?;
        Ok(Captured {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn exec_async(
        &self,
        request: &PodExecRequest,
        stdin: Vec<u8>,
        output: OutputSink<'_>,
    ) -> Result<(), ClusterError> {
        let mut command = self.command();
        command
            .args(exec_args(request))
            .stdin(if stdin.is_empty() {
                Stdio::null()
            } else {
                Stdio::piped()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            pod = %request.pod,
            container = %request.container,
            argv = ?request.argv,
            "kubectl exec"
        );
        let mut child = command.spawn().map_err(|error| self.spawn_failed(&error))?;

        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let feed = async move {
            if let Some(mut pipe) = stdin_pipe {
                pipe.write_all(&stdin).await?;
                pipe.shutdown().await?;
            }
            Ok::<(), io::Error>(())
        };
        let (lines_tx, lines_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        let read_stdout = read_lines(stdout_pipe, Stream::Stdout, lines_tx.clone());
        let read_stderr = read_lines(stderr_pipe, Stream::Stderr, lines_tx);

        let (fed, read_out, read_err, forwarding) = tokio::join!(
            feed,
            read_stdout,
            read_stderr,
            forward_lines(lines_rx, output)
        );
        let status = child.wait().await.map_err(|error| ClusterError::Transport {
            message: format!("failed waiting for {}: {error}", self.binary),
        })?;
        let (forwarded, stderr) = forwarding;

        if !status.success() {
            return Err(classify_exec_failure(&stderr, status));
        }
        fed.and(read_out)
            .and(read_err)
            .and(forwarded)
            .map_err(|error| ClusterError::Transport {
                message: format!("kubectl exec stream failed: {error}"),
            })
    }

    async fn node_runtime_async(&self) -> Result<ContainerRuntime, ClusterError> {
        let captured = self
            .run_captured(&["get", "nodes", "-o", NODE_RUNTIME_JSONPATH])
            .await?;
        if !captured.status.success() {
            return Err(ClusterError::Transport {
                message: format!("failed to read node runtime: {}", captured.stderr.trim()),
            });
        }
        Ok(ContainerRuntime::from_runtime_version(&captured.stdout))
    }

    async fn container_running_async(&self, container: &ContainerRef) -> Result<bool, ClusterError> {
        let captured = self
            .run_captured(&[
                "get",
                "pod",
                container.pod_id(),
                "-n",
                container.namespace(),
                "-o",
                CONTAINER_STATUS_JSONPATH,
            ])
            .await?;
        if !captured.status.success() {
            if captured.stderr.contains("NotFound") {
                return Ok(false);
            }
            return Err(ClusterError::Transport {
                message: format!(
                    "failed to read status of pod {}: {}",
                    container.pod_id(),
                    captured.stderr.trim()
                ),
            });
        }
        Ok(container_is_running(&captured.stdout, container))
    }

    fn spawn_failed(&self, error: &io::Error) -> ClusterError {
        ClusterError::Transport {
            message: format!("failed to run {}: {error}", self.binary),
        }
    }
}

impl ClusterClient for KubectlClient {
    fn exec<'a>(
        &'a self,
        request: &'a PodExecRequest,
        stdin: Vec<u8>,
        output: OutputSink<'a>,
    ) -> ClusterExecFuture<'a> {
        Box::pin(self.exec_async(request, stdin, output))
    }

    fn node_container_runtime(&self) -> NodeRuntimeFuture<'_> {
        Box::pin(self.node_runtime_async())
    }

    fn container_running<'a>(&'a self, container: &'a ContainerRef) -> ContainerRunningFuture<'a> {
        Box::pin(self.container_running_async(container))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read `pipe` line by line into `lines`, keeping a trailing partial line.
async fn read_lines<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    stream: Stream,
    lines: mpsc::Sender<(Stream, Vec<u8>)>,
) -> io::Result<()> {
    let Some(reader) = pipe else {
        return Ok(());
    };
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        if lines.send((stream, line)).await.is_err() {
            return Ok(());
        }
    }
}

/// Write both streams into `output` in arrival order.
///
/// Returns the write result and a copy of stderr for failure
/// classification. kubectl's own exit marker stays out of the sink.
async fn forward_lines(
    mut lines: mpsc::Receiver<(Stream, Vec<u8>)>,
    output: OutputSink<'_>,
) -> (io::Result<()>, String) {
    let mut stderr = String::new();
    let mut written = Ok(());
    while let Some((stream, line)) = lines.recv().await {
        if stream == Stream::Stderr {
            let text = String::from_utf8_lossy(&line);
            stderr.push_str(&text);
            if text.contains(REMOTE_EXIT_MARKER) {
                continue;
            }
        }
        if written.is_ok() {
            written = output.write_all(&line).await;
        }
    }
    if written.is_ok() {
        written = output.flush().await;
    }
    (written, stderr)
}

fn exec_args(request: &PodExecRequest) -> Vec<String> {
    let mut args = vec![
        String::from("exec"),
        String::from("-i"),
        String::from("-n"),
        request.namespace.clone(),
        request.pod.clone(),
        String::from("-c"),
        request.container.clone(),
        String::from("--"),
    ];
    args.extend(request.argv.iter().cloned());
    args
}

fn classify_exec_failure(stderr: &str, status: ExitStatus) -> ClusterError {
    if let Some(code) = remote_exit_code(stderr) {
        return ClusterError::Exit { code };
    }
    let detail = stderr.trim();
    ClusterError::Transport {
        message: if detail.is_empty() {
            format!("kubectl exec failed with {status}")
        } else {
            format!("kubectl exec failed: {detail}")
        },
    }
}

fn remote_exit_code(stderr: &str) -> Option<i64> {
    stderr.lines().find_map(|line| {
        let (_, tail) = line.split_once(REMOTE_EXIT_MARKER)?;
        tail.trim().parse().ok()
    })
}

fn container_is_running(status_table: &str, container: &ContainerRef) -> bool {
    status_table.lines().any(|line| {
        let mut fields = line.split('\t');
        let name = fields.next().unwrap_or_default();
        let runtime_id = fields.next().unwrap_or_default();
        let started_at = fields.next().unwrap_or_default();
        let bare_id = runtime_id
            .split_once("://")
            .map_or(runtime_id, |(_, id)| id);
        name == container.container_name()
            && !started_at.trim().is_empty()
            && (container.container_id().is_empty() || bare_id == container.container_id())
    })
}
