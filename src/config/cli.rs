//! Command-line argument definitions for liveswap.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::archive::CopyMapping;
use crate::mode::UpdateMode;

/// Command-line interface for liveswap.
#[derive(Debug, Parser)]
#[command(name = "liveswap")]
#[command(
    author,
    version,
    about = "Patch running containers in place, falling back to full rebuilds"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Update mode: auto, image, container, exec or sync.
    #[arg(long, global = true)]
    pub update_mode: Option<UpdateMode>,

    /// Kubeconfig context to target.
    #[arg(long, global = true)]
    pub kube_context: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Probe the environment and print the resolved update mode.
    Mode,

    /// Apply one live update to one running container.
    Sync(SyncArgs),
}

/// Arguments for the `sync` subcommand.
#[derive(Debug, Parser)]
pub struct SyncArgs {
    /// Pod hosting the container; omit to target a daemon container.
    #[arg(long)]
    pub pod: Option<String>,

    /// Container name inside the pod, or the daemon container name or ID.
    #[arg(long, required = true)]
    pub container: String,

    /// Container ID the running instance must still have.
    #[arg(long)]
    pub container_id: Option<String>,

    /// Namespace of the pod; the configured namespace when omitted.
    #[arg(long)]
    pub namespace: Option<String>,

    /// Absolute container path to remove before copying.
    #[arg(long = "delete", value_name = "PATH")]
    pub delete: Vec<String>,

    /// Host path to copy, as `<local>:<container>`.
    #[arg(long = "copy", value_name = "LOCAL:CONTAINER")]
    pub copy: Vec<CopyMapping>,

    /// Shell command to run after copying, in order.
    #[arg(long = "run", value_name = "CMD")]
    pub run: Vec<String>,

    /// Restart the container afterwards instead of relying on hot reload.
    #[arg(long)]
    pub restart: bool,
}
