//! Session assembly.
//!
//! A [`Session`] is built once per engine run. Assembly detects the cluster
//! environment, probes runtime capabilities, resolves the update mode and
//! constructs the updaters, strategies and dispatcher from the injected
//! collaborators. The resolved mode never changes for the session's
//! lifetime.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cluster::{ClusterClient, ClusterEnv};
use crate::config::AppConfig;
use crate::dispatch::CompositeDispatcher;
use crate::engine::{ContainerLifecycle, DaemonClient};
use crate::error::{ConfigError, DispatchError, LiveswapError, UpdateError, UpdateStage};
use crate::mode::{ResolvedUpdateMode, UpdaterKind, resolve_update_mode};
use crate::model::{BuildOutcome, ContainerRef, Target, UpdateSpec};
use crate::runtime::{RuntimeCapabilities, probe_capabilities};
use crate::strategy::{
    ComposeClient, ComposeStrategy, FullImageStrategy, ImageBuilder, ImagePusher,
    LiveUpdateStrategy, LocalStrategy, ManifestApplier, default_build_order,
};
use crate::update::{
    ContainerUpdater, DirectDaemonUpdater, RemoteExecUpdater, SidecarConnector,
    SidecarProxyUpdater,
};

/// External clients a session may use. Absent clients disable whatever
/// depends on them.
#[derive(Default, Clone)]
pub struct Collaborators {
    /// Cluster API client.
    pub cluster: Option<Arc<dyn ClusterClient>>,
    /// Local container daemon client.
    pub daemon: Option<Arc<dyn DaemonClient>>,
    /// Connector for in-pod sidecar proxies.
    pub sidecar: Option<Arc<dyn SidecarConnector>>,
    /// Image builder for full rebuilds and compose services.
    pub image_builder: Option<Arc<dyn ImageBuilder>>,
    /// Registry pusher, skipped when the cluster shares the local daemon.
    pub image_pusher: Option<Arc<dyn ImagePusher>>,
    /// Manifest applier for cluster deployments.
    pub manifest_applier: Option<Arc<dyn ManifestApplier>>,
    /// Compose client for compose services.
    pub compose: Option<Arc<dyn ComposeClient>>,
}

/// The composition root of one engine run.
pub struct Session {
    env: ClusterEnv,
    capabilities: RuntimeCapabilities,
    update_mode: ResolvedUpdateMode,
    live_updater: Option<Arc<ContainerUpdater>>,
    daemon_updater: Option<Arc<ContainerUpdater>>,
    dispatcher: CompositeDispatcher,
}

impl Session {
    /// Assemble a session from configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsatisfiableUpdateMode` when the requested mode
    /// cannot work in the detected environment, and
    /// `ConfigError::MissingRequired` when the resolved updater needs a
    /// collaborator that was not supplied.
    pub async fn assemble(
        config: &AppConfig,
        collaborators: &Collaborators,
    ) -> Result<Self, LiveswapError> {
        let env = config
            .cluster
            .env
            .unwrap_or_else(|| ClusterEnv::from_context(config.kube_context.as_deref()));
        let cluster = collaborators.cluster.as_deref().filter(|_| env.is_cluster());
        let daemon = collaborators
            .daemon
            .as_deref()
            .map(|client| client as &dyn ContainerLifecycle);
        let sidecar_available = collaborators.sidecar.is_some() && cluster.is_some();

        let capabilities =
            probe_capabilities(daemon, cluster, sidecar_available, config.probe.settings()).await;
        let update_mode = resolve_update_mode(config.update_mode, env, &capabilities)?;

        let live_updater = update_mode
            .updater()
            .map(|kind| build_updater(kind, collaborators).map(Arc::new))
            .transpose()?;
        let daemon_updater = compose_updater(
            update_mode,
            &capabilities,
            collaborators,
            live_updater.as_ref(),
        );
        let cluster_updater = live_updater.clone().filter(|_| env.is_cluster());

        let live_update = LiveUpdateStrategy::new(cluster_updater, daemon_updater.clone());
        let strategies = default_build_order(
            update_mode,
            Some(live_update),
            full_image_strategy(env, collaborators),
            compose_strategy(collaborators),
            LocalStrategy,
        );
        let dispatcher = CompositeDispatcher::new(strategies);
        info!(
            env = %env,
            update_mode = %update_mode,
            order = ?dispatcher.order(),
            "session assembled"
        );

        Ok(Self {
            env,
            capabilities,
            update_mode,
            live_updater,
            daemon_updater,
            dispatcher,
        })
    }

    /// The update mode resolved at assembly.
    #[must_use]
    pub const fn update_mode(&self) -> ResolvedUpdateMode {
        self.update_mode
    }

    /// Capabilities probed at assembly.
    #[must_use]
    pub const fn capabilities(&self) -> &RuntimeCapabilities {
        &self.capabilities
    }

    /// The detected cluster environment.
    #[must_use]
    pub const fn env(&self) -> ClusterEnv {
        self.env
    }

    /// Strategy names in the order they are tried.
    #[must_use]
    pub fn build_order(&self) -> Vec<&'static str> {
        self.dispatcher.order()
    }

    /// The updater serving `container`: the session's resolved updater for
    /// pod containers, the direct daemon updater otherwise.
    #[must_use]
    pub fn updater_for(&self, container: &ContainerRef) -> Option<&ContainerUpdater> {
        if container.in_pod() {
            self.live_updater.as_deref().filter(|_| self.env.is_cluster())
        } else {
            self.daemon_updater.as_deref()
        }
    }

    /// Apply one update to one container outside any build cycle.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when the session has no updater
    /// for the container, and otherwise the updater's failure.
    pub async fn update_container(
        &self,
        cancel: &CancellationToken,
        container: &ContainerRef,
        spec: &UpdateSpec,
    ) -> Result<(), LiveswapError> {
        let updater = self.updater_for(container).ok_or_else(|| {
            LiveswapError::from(ConfigError::InvalidValue {
                field: String::from("update_mode"),
                reason: format!(
                    "the '{}' session has no live-update transport for {container}",
                    self.update_mode
                ),
            })
        })?;
        if !updater.revalidate(container).await? {
            return Err(UpdateError::Transport {
                container: container.clone(),
                stage: UpdateStage::Revalidate,
                message: String::from("the container is no longer running"),
            }
            .into());
        }
        updater.apply_update(cancel, container, spec).await?;
        Ok(())
    }

    /// Build and deploy `target` with the first strategy that accepts it.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's failure.
    pub async fn build(
        &self,
        cancel: &CancellationToken,
        target: &Target,
    ) -> Result<BuildOutcome, DispatchError> {
        self.dispatcher.build(cancel, target).await
    }
}

fn build_updater(
    kind: UpdaterKind,
    collaborators: &Collaborators,
) -> Result<ContainerUpdater, LiveswapError> {
    let updater = match kind {
        UpdaterKind::DirectDaemon => ContainerUpdater::from(DirectDaemonUpdater::new(required(
            collaborators.daemon.as_ref(),
            "daemon",
        )?)),
        UpdaterKind::RemoteExec => ContainerUpdater::from(RemoteExecUpdater::new(required(
            collaborators.cluster.as_ref(),
            "cluster",
        )?)),
        UpdaterKind::SidecarProxy => ContainerUpdater::from(SidecarProxyUpdater::new(
            required(collaborators.sidecar.as_ref(), "sidecar")?,
            required(collaborators.cluster.as_ref(), "cluster")?,
        )),
    };
    Ok(updater)
}

fn required<T: ?Sized>(client: Option<&Arc<T>>, name: &str) -> Result<Arc<T>, LiveswapError> {
    client.cloned().ok_or_else(|| {
        LiveswapError::from(ConfigError::MissingRequired {
            field: format!("{name} client"),
        })
    })
}

/// Updater for compose containers on the local daemon.
///
/// Shares the session updater when that already talks to the daemon.
fn compose_updater(
    mode: ResolvedUpdateMode,
    capabilities: &RuntimeCapabilities,
    collaborators: &Collaborators,
    live_updater: Option<&Arc<ContainerUpdater>>,
) -> Option<Arc<ContainerUpdater>> {
    if !mode.is_live_update() || !capabilities.daemon_reachable() {
        return None;
    }
    if let Some(shared) = live_updater.filter(|u| u.kind() == UpdaterKind::DirectDaemon) {
        return Some(Arc::clone(shared));
    }
    collaborators
        .daemon
        .clone()
        .map(|daemon| Arc::new(ContainerUpdater::from(DirectDaemonUpdater::new(daemon))))
}

fn full_image_strategy(env: ClusterEnv, collaborators: &Collaborators) -> Option<FullImageStrategy> {
    let builder = collaborators.image_builder.clone()?;
    let applier = collaborators.manifest_applier.clone()?;
    let pusher = collaborators
        .image_pusher
        .clone()
        .filter(|_| !env.shares_local_daemon());
    Some(FullImageStrategy::new(builder, pusher, applier))
}

fn compose_strategy(collaborators: &Collaborators) -> Option<ComposeStrategy> {
    collaborators
        .compose
        .clone()
        .map(|compose| ComposeStrategy::new(collaborators.image_builder.clone(), compose))
}
