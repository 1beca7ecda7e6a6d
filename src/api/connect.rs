//! Concrete collaborators for the command-line adapter.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cluster::{ClusterClient, KubectlClient};
use crate::config::AppConfig;
use crate::engine::{DaemonClient, EngineConnector, SocketResolver};
use crate::session::Collaborators;

/// Fill in the active kubeconfig context when none is configured.
///
/// A configured cluster environment override skips the lookup. Failure to
/// run `kubectl` leaves the context unset, which means no cluster.
pub async fn with_active_context(mut config: AppConfig) -> AppConfig {
    if config.kube_context.is_some() || config.cluster.env.is_some() {
        return config;
    }
    match KubectlClient::new(config.cluster.kubectl.as_str())
        .current_context()
        .await
    {
        Ok(context) => config.kube_context = context,
        Err(error) => debug!(%error, "no kubeconfig context available"),
    }
    config
}

/// Connect the daemon and cluster clients the CLI uses.
///
/// An unusable daemon socket leaves the daemon out; the capability probe
/// then reports it unreachable.
#[must_use]
pub fn connect_collaborators<E: mockable::Env>(config: &AppConfig, env: &E) -> Collaborators {
    let resolver = SocketResolver::new(env);
    let daemon = match EngineConnector::connect_with_fallback(
        config.engine_socket.as_deref(),
        &resolver,
    ) {
        Ok(docker) => Some(Arc::new(docker) as Arc<dyn DaemonClient>),
        Err(error) => {
            info!(%error, "container daemon unavailable");
            None
        }
    };
    let cluster = KubectlClient::new(config.cluster.kubectl.as_str())
        .with_context(config.kube_context.clone());

    Collaborators {
        cluster: Some(Arc::new(cluster) as Arc<dyn ClusterClient>),
        daemon,
        ..Collaborators::default()
    }
}
