//! Configuration data types for liveswap.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterEnv;
use crate::mode::UpdateMode;
use crate::runtime::ProbeSettings;

/// Cluster access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// The `kubectl` binary used for remote exec and runtime queries.
    pub kubectl: String,

    /// Namespace assumed for pods named without one.
    pub namespace: String,

    /// Override for the detected cluster environment.
    ///
    /// When unset the environment is classified from the kubeconfig context.
    pub env: Option<ClusterEnv>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubectl: String::from("kubectl"),
            namespace: String::from("default"),
            env: None,
        }
    }
}

/// Capability probe timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Seconds to wait for the container daemon to answer a ping.
    pub daemon_timeout_secs: u64,

    /// Seconds to wait for the cluster's node runtime query.
    pub cluster_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            daemon_timeout_secs: 10,
            cluster_timeout_secs: 20,
        }
    }
}

impl ProbeConfig {
    /// Convert the configured timeouts into probe settings.
    #[must_use]
    pub const fn settings(&self) -> ProbeSettings {
        ProbeSettings {
            daemon_timeout: Duration::from_secs(self.daemon_timeout_secs),
            cluster_timeout: Duration::from_secs(self.cluster_timeout_secs),
        }
    }
}

/// Root application configuration.
///
/// This structure is loaded from configuration files, environment variables,
/// and command-line arguments with layered precedence. The precedence order
/// (lowest to highest) is: defaults, configuration file, environment variables,
/// command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `LIVESWAP_CONFIG_PATH` environment variable
/// 2. `.liveswap.toml` in the current working directory
/// 3. `.liveswap.toml` in the home directory
/// 4. `~/.config/liveswap/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "LIVESWAP",
    post_merge_hook,
    discovery(
        app_name = "liveswap",
        env_var = "LIVESWAP_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".liveswap.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// The container engine socket path or URL.
    pub engine_socket: Option<String>,

    /// The requested update mode.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub update_mode: UpdateMode,

    /// The kubeconfig context to target; the active context when unset.
    pub kube_context: Option<String>,

    /// Cluster access configuration.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub cluster: ClusterConfig,

    /// Capability probe timeouts.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub probe: ProbeConfig,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // Blank strings from env or file layers mean "unset".
        self.engine_socket = self.engine_socket.take().filter(|s| !s.trim().is_empty());
        self.kube_context = self.kube_context.take().filter(|s| !s.trim().is_empty());
        Ok(())
    }
}
