//! The `mode` command: report how this environment would be updated.

use std::fmt;

use crate::cluster::ClusterEnv;
use crate::config::AppConfig;
use crate::error::Result as LiveswapResult;
use crate::mode::ResolvedUpdateMode;
use crate::runtime::RuntimeCapabilities;
use crate::session::{Collaborators, Session};

/// Everything the session decided at assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeReport {
    /// Detected cluster environment.
    pub env: ClusterEnv,
    /// Probed capabilities.
    pub capabilities: RuntimeCapabilities,
    /// Resolved update mode.
    pub update_mode: ResolvedUpdateMode,
    /// Strategy names in the order they are tried.
    pub build_order: Vec<&'static str>,
}

impl fmt::Display for ModeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        writeln!(f, "cluster env:       {}", self.env)?;
        writeln!(
            f,
            "daemon reachable:  {}",
            yes_no(self.capabilities.daemon_reachable())
        )?;
        match self.capabilities.cluster_runtime() {
            Some(runtime) => writeln!(f, "cluster runtime:   {runtime}")?,
            None => writeln!(f, "cluster runtime:   none")?,
        }
        writeln!(
            f,
            "sidecar available: {}",
            yes_no(self.capabilities.sidecar_available())
        )?;
        writeln!(f, "update mode:       {}", self.update_mode)?;
        write!(f, "build order:       {}", self.build_order.join(", "))
    }
}

/// Assemble a session and report what it resolved.
///
/// # Errors
///
/// Returns `ConfigError::UnsatisfiableUpdateMode` when the requested mode
/// cannot work here.
pub async fn mode(config: &AppConfig, collaborators: &Collaborators) -> LiveswapResult<ModeReport> {
    let session = Session::assemble(config, collaborators).await?;
    Ok(ModeReport {
        env: session.env(),
        capabilities: *session.capabilities(),
        update_mode: session.update_mode(),
        build_order: session.build_order(),
    })
}
