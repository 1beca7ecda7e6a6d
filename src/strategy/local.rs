//! Host commands for local targets.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{StrategyResult, cancelled};
use crate::error::BuildError;
use crate::model::{BuildOutcome, Deploy, LocalCommand, Target};

/// Runs a local target's command on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStrategy;

impl LocalStrategy {
    /// Strategy name.
    pub const NAME: &'static str = "local";

    pub(super) const fn can_handle(target: &Target) -> bool {
        matches!(target.deploy(), Deploy::Local(_))
    }

    pub(super) async fn build(&self, cancel: &CancellationToken, target: &Target) -> StrategyResult {
        let Deploy::Local(command) = target.deploy() else {
            return StrategyResult::ineligible("not a local target");
        };
        if cancel.is_cancelled() {
            return cancelled(target);
        }
        match run(cancel, command).await {
            Ok(true) => StrategyResult::Success(BuildOutcome::new(Self::NAME, target.id().clone())),
            Ok(false) => cancelled(target),
            Err(error) => StrategyResult::Failed(error),
        }
    }
}

/// Run `command` to completion; `Ok(false)` when cancelled.
async fn run(cancel: &CancellationToken, command: &LocalCommand) -> Result<bool, BuildError> {
    let line = command.argv.join(" ");
    let Some((program, args)) = command.argv.split_first() else {
        return Err(BuildError::LocalSpawn {
            command: line,
            message: String::from("empty command"),
        });
    };

    let mut process = Command::new(program);
    process
        .args(args)
        .envs(command.env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(workdir) = &command.workdir {
        process.current_dir(workdir);
    }

    debug!(command = %line, "spawning local command");
    let mut child = process.spawn().map_err(|error| BuildError::LocalSpawn {
        command: line.clone(),
        message: error.to_string(),
    })?;

    let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(log_lines(pipe, "stdout")));
    let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(log_lines(pipe, "stderr")));

    let status = tokio::select! {
        () = cancel.cancelled() => {
            warn!(command = %line, "local command cancelled");
            if let Err(error) = child.kill().await {
                debug!(%error, "failed to kill local command");
            }
            return Ok(false);
        }
        status = child.wait() => status.map_err(|error| BuildError::LocalSpawn {
            command: line.clone(),
            message: error.to_string(),
        })?,
    };

    for task in [stdout_task, stderr_task].into_iter().flatten() {
        if let Err(error) = task.await {
            debug!(%error, "output forwarding task ended abnormally");
        }
    }

    if status.success() {
        Ok(true)
    } else {
        Err(BuildError::LocalCommand {
            command: line,
            exit_code: status.code(),
        })
    }
}

async fn log_lines<R: AsyncRead + Unpin>(pipe: R, stream: &'static str) {
    let mut lines = BufReader::new(pipe).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(target: "liveswap::output", source = "local", stream, "{line}");
    }
}
