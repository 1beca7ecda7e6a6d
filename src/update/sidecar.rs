//! Updates streamed through a sidecar proxy running in the pod.
//!
//! The proxy owns the container runtime on the node. One request carries the
//! whole update and the proxy answers with ordered step events; the updater
//! checks the order against the protocol and maps failures onto the shared
//! error taxonomy.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_util::{Stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::guard::{InFlight, lock};
use super::{announce_command, command_error, ensure_not_cancelled, transport_error};
use crate::cluster::ClusterClient;
use crate::error::{UpdateError, UpdateStage};
use crate::model::{ContainerRef, UpdateSpec};
use crate::output::CommandLog;

/// Failure reported by the sidecar transport itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SidecarError {
    /// A description of the failure.
    pub message: String,
}

/// One update request sent to the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarRequest {
    /// Runtime identifier of the target container.
    pub container_id: String,
    /// Paths to remove before unpacking.
    pub files_to_delete: Vec<String>,
    /// Tar archive to unpack into the container root.
    pub archive: Vec<u8>,
    /// Commands to run after unpacking.
    pub commands: Vec<Vec<String>>,
    /// Restart the container once the commands succeed.
    pub restart: bool,
}

impl SidecarRequest {
    fn from_spec(container: &ContainerRef, spec: &UpdateSpec) -> Self {
        Self {
            container_id: String::from(container.container_id()),
            files_to_delete: spec.files_to_delete().to_vec(),
            archive: spec.archive_to_copy().to_vec(),
            commands: spec
                .commands()
                .iter()
                .map(|command| command.argv().to_vec())
                .collect(),
            restart: !spec.hot_reload_allowed(),
        }
    }
}

/// Progress reported by the proxy while it applies a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarEvent {
    /// One line of command output.
    Log {
        /// The output line.
        line: String,
    },
    /// A protocol step finished successfully.
    StepDone(UpdateStage),
    /// A protocol step failed; the proxy stops after this event.
    Failed {
        /// The step that failed.
        step: UpdateStage,
        /// Exit code of a failing command, when the command ran.
        exit_code: Option<i64>,
        /// The proxy's description of the failure.
        message: String,
    },
    /// Every step finished.
    Completed,
}

/// Boxed future returned by [`SidecarConnector::connect`].
pub type SidecarConnectFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Arc<dyn SidecarSession>, SidecarError>> + Send + 'a>>;

/// Event stream returned by [`SidecarSession::update_container`].
pub type SidecarEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<SidecarEvent, SidecarError>> + Send + 'a>>;

/// Opens sessions to the proxy serving a pod.
pub trait SidecarConnector: Send + Sync {
    /// Connect to the proxy on the node running `container`'s pod.
    fn connect<'a>(&'a self, container: &'a ContainerRef) -> SidecarConnectFuture<'a>;
}

/// An open session to one proxy.
pub trait SidecarSession: Send + Sync {
    /// Stream one update request and its step events.
    fn update_container(&self, request: SidecarRequest) -> SidecarEventStream<'_>;
}

type PodKey = (String, String);

/// Applies updates through the pod's sidecar proxy.
pub struct SidecarProxyUpdater {
    connector: Arc<dyn SidecarConnector>,
    cluster: Arc<dyn ClusterClient>,
    sessions: Mutex<HashMap<PodKey, Arc<dyn SidecarSession>>>,
    in_flight: InFlight,
}

impl SidecarProxyUpdater {
    /// Create an updater connecting through `connector`; containers are
    /// revalidated through `cluster`.
    #[must_use]
    pub fn new(connector: Arc<dyn SidecarConnector>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            connector,
            cluster,
            sessions: Mutex::new(HashMap::new()),
            in_flight: InFlight::default(),
        }
    }

    pub(super) const fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub(super) async fn revalidate(&self, container: &ContainerRef) -> Result<bool, UpdateError> {
        self.cluster
            .container_running(container)
            .await
            .map_err(|error| transport_error(container, UpdateStage::Revalidate, error.to_string()))
    }

    pub(super) async fn apply(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        spec: &UpdateSpec,
    ) -> Result<(), UpdateError> {
        ensure_not_cancelled(cancel, container, UpdateStage::Session)?;
        let session = self.session(container).await?;
        let result = self.stream_update(cancel, container, session.as_ref(), spec).await;
        if matches!(result, Err(UpdateError::Transport { .. })) {
            warn!(container = %container, "dropping sidecar session after transport failure");
            lock(&self.sessions).remove(&pod_key(container));
        }
        result
    }

    async fn session(&self, container: &ContainerRef) -> Result<Arc<dyn SidecarSession>, UpdateError> {
        let key = pod_key(container);
        let cached = lock(&self.sessions).get(&key).cloned();
        if let Some(session) = cached {
            return Ok(session);
        }
        debug!(container = %container, "opening sidecar session");
        let session = self
            .connector
            .connect(container)
            .await
            .map_err(|error| transport_error(container, UpdateStage::Session, error.message))?;
        lock(&self.sessions).insert(key, Arc::clone(&session));
        Ok(session)
    }

    async fn stream_update(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        session: &dyn SidecarSession,
        spec: &UpdateSpec,
    ) -> Result<(), UpdateError> {
        let steps = expected_steps(spec);
        let mut progress = StepTracker::new(container, spec, &steps);
        let mut log = CommandLog::new(container.to_string());
        let mut events = session.update_container(SidecarRequest::from_spec(container, spec));

        progress.announce_next();
        loop {
            let next = tokio::select! {
                biased;
                event = events.next() => event,
                () = cancel.cancelled() => return Err(progress.cancelled()),
            };
            let event = next
                .ok_or_else(|| progress.transport("proxy closed the stream before completing"))?
                .map_err(|error| progress.transport(error.message))?;
            match event {
                SidecarEvent::Log { line } => log.line(&line),
                SidecarEvent::StepDone(step) => {
                    progress.complete(step)?;
                    if !progress.finished() {
                        ensure_not_cancelled(cancel, container, progress.current())?;
                        progress.announce_next();
                    }
                }
                SidecarEvent::Failed {
                    step,
                    exit_code,
                    message,
                } => return Err(progress.failed(step, exit_code, message)),
                SidecarEvent::Completed => return progress.completed(),
            }
        }
    }
}

fn pod_key(container: &ContainerRef) -> PodKey {
    (
        String::from(container.namespace()),
        String::from(container.pod_id()),
    )
}

/// The step sequence the proxy must report for `spec`.
fn expected_steps(spec: &UpdateSpec) -> Vec<UpdateStage> {
    let mut steps = Vec::new();
    if !spec.files_to_delete().is_empty() {
        steps.push(UpdateStage::Delete);
    }
    if !spec.archive_to_copy().is_empty() {
        steps.push(UpdateStage::Copy);
    }
    steps.extend((0..spec.commands().len()).map(UpdateStage::Run));
    if !spec.hot_reload_allowed() {
        steps.push(UpdateStage::Restart);
    }
    steps
}

/// Checks proxy events against the expected step order.
struct StepTracker<'a> {
    container: &'a ContainerRef,
    spec: &'a UpdateSpec,
    steps: &'a [UpdateStage],
    position: usize,
}

impl<'a> StepTracker<'a> {
    const fn new(container: &'a ContainerRef, spec: &'a UpdateSpec, steps: &'a [UpdateStage]) -> Self {
        Self {
            container,
            spec,
            steps,
            position: 0,
        }
    }

    const fn finished(&self) -> bool {
        self.position >= self.steps.len()
    }

    /// The step in progress; the last step once all are done.
    fn current(&self) -> UpdateStage {
        self.steps
            .get(self.position)
            .or_else(|| self.steps.last())
            .copied()
            .unwrap_or(UpdateStage::Session)
    }

    fn announce_next(&self) {
        if let Some(UpdateStage::Run(index)) = self.steps.get(self.position) {
            if let Some(command) = self.spec.commands().get(*index) {
                announce_command(self.container, *index, self.spec.commands().len(), command);
            }
        }
    }

    fn complete(&mut self, step: UpdateStage) -> Result<(), UpdateError> {
        self.expect(step)?;
        self.position += 1;
        Ok(())
    }

    fn expect(&self, step: UpdateStage) -> Result<(), UpdateError> {
        match self.steps.get(self.position) {
            Some(expected) if *expected == step => Ok(()),
            Some(expected) => Err(self.transport(format!(
                "proxy reported '{step}' while '{expected}' was expected"
            ))),
            None => Err(self.transport(format!(
                "proxy reported '{step}' after every step had finished"
            ))),
        }
    }

    fn failed(&self, step: UpdateStage, exit_code: Option<i64>, message: String) -> UpdateError {
        if let Err(out_of_order) = self.expect(step) {
            return out_of_order;
        }
        let command = match step {
            UpdateStage::Run(index) => self.spec.commands().get(index).map(|c| (index, c)),
            _ => None,
        };
        match (command, exit_code) {
            (Some((index, failing)), Some(code)) => {
                command_error(self.container, index, failing, code)
            }
            _ => transport_error(self.container, step, message),
        }
    }

    fn completed(&self) -> Result<(), UpdateError> {
        if self.finished() {
            Ok(())
        } else {
            Err(self.transport(format!(
                "proxy reported completion before '{}'",
                self.current()
            )))
        }
    }

    fn cancelled(&self) -> UpdateError {
        UpdateError::Cancelled {
            container: self.container.clone(),
            stage: self.current(),
        }
    }

    fn transport(&self, message: impl Into<String>) -> UpdateError {
        transport_error(self.container, self.current(), message)
    }
}
