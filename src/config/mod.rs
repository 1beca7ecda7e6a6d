//! Configuration system for liveswap.
//!
//! This module provides the configuration structures and CLI definitions.
//! [`load_config`] merges defaults, the configuration file, `LIVESWAP_*`
//! environment variables and command-line flags, later layers winning.
//!
//! The configuration file is expected at `~/.config/liveswap/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///var/run/docker.sock"
//! update_mode = "auto"
//! kube_context = "kind-dev"
//!
//! [cluster]
//! kubectl = "kubectl"
//! namespace = "dev"
//!
//! [probe]
//! daemon_timeout_secs = 5
//! cluster_timeout_secs = 20
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{Cli, Commands, SyncArgs};
pub use loader::{env_var_names, load_config};
pub use types::{AppConfig, ClusterConfig, ProbeConfig};
