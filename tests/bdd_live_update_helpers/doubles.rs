//! Recording collaborators built on the public traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use liveswap::cluster::{
    ClusterClient, ClusterError, ClusterExecFuture, ContainerRunningFuture, NodeRuntimeFuture,
    PodExecRequest,
};
use liveswap::model::{ContainerRef, ImageBuildResult, ImageTarget, Manifest, TargetId};
use liveswap::output::OutputSink;
use liveswap::runtime::ContainerRuntime;
use liveswap::strategy::{CollaboratorFuture, ImageBuilder, ManifestApplier};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cluster double recording every remote command line.
pub(crate) struct RecordingCluster {
    commands: Mutex<Vec<String>>,
    failing: Mutex<Option<(String, i64)>>,
    running: AtomicBool,
}

impl RecordingCluster {
    pub(crate) fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            failing: Mutex::new(None),
            running: AtomicBool::new(true),
        }
    }

    /// Make `command` exit with `code`.
    pub(crate) fn fail_command(&self, command: &str, code: i64) {
        *lock(&self.failing) = Some((String::from(command), code));
    }

    pub(crate) fn replace_container(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }
}

impl ClusterClient for RecordingCluster {
    fn exec<'a>(
        &'a self,
        request: &'a PodExecRequest,
        _stdin: Vec<u8>,
        _output: OutputSink<'a>,
    ) -> ClusterExecFuture<'a> {
        let line = request.argv.join(" ");
        lock(&self.commands).push(line.clone());
        let exit = lock(&self.failing)
            .as_ref()
            .filter(|(command, _)| *command == line)
            .map(|(_, code)| *code);
        Box::pin(async move {
            exit.map_or(Ok(()), |code| Err(ClusterError::Exit { code }))
        })
    }

    fn node_container_runtime(&self) -> NodeRuntimeFuture<'_> {
        Box::pin(async { Ok(ContainerRuntime::Containerd) })
    }

    fn container_running<'a>(&'a self, _container: &'a ContainerRef) -> ContainerRunningFuture<'a> {
        let running = self.running.load(Ordering::SeqCst);
        Box::pin(async move { Ok(running) })
    }
}

/// Image builder and manifest applier sharing one event log.
pub(crate) struct RecordingDeployer {
    events: Mutex<Vec<String>>,
}

impl RecordingDeployer {
    pub(crate) const fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }
}

impl ImageBuilder for RecordingDeployer {
    fn build(&self, target: &TargetId, image: &ImageTarget) -> CollaboratorFuture<'_, ImageBuildResult> {
        lock(&self.events).push(format!("build {target}"));
        let built = ImageBuildResult {
            image_ref: format!("{}:v2", image.repository),
            digest: String::from("sha256:2"),
        };
        Box::pin(async move { Ok(built) })
    }
}

impl ManifestApplier for RecordingDeployer {
    fn apply(&self, manifest: &Manifest, image: &ImageBuildResult) -> CollaboratorFuture<'_, ()> {
        lock(&self.events).push(format!("apply {} {}", manifest.name, image.image_ref));
        Box::pin(async { Ok(()) })
    }
}
