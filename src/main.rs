//! `liveswap` application entry point.
//!
//! This binary is a thin adapter over [`liveswap::api`]. It uses `eyre` for
//! opaque error handling at the application boundary, converting
//! domain-specific errors into human-readable reports.
//!
//! Configuration is loaded with layered precedence via `OrthoConfig`:
//! 1. Application defaults
//! 2. Configuration file (`~/.config/liveswap/config.toml` or path from
//!    `LIVESWAP_CONFIG_PATH`)
//! 3. Environment variables (`LIVESWAP_*`)
//! 4. Command-line arguments
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `liveswap=info`).

use std::process::ExitCode;

use clap::Parser;
use eyre::{Report, Result as EyreResult};
use liveswap::api::{self, CommandOutcome, SyncRequest};
use liveswap::config::{AppConfig, Cli, Commands, SyncArgs, load_config};
use liveswap::error::Result as LiveswapResult;
use mockable::DefaultEnv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> EyreResult<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("liveswap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse CLI first (for subcommand dispatch and global options).
    let cli = Cli::parse();
    let config = load_config(&cli).map_err(Report::from)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime
        .block_on(run(&cli, config))
        .map_err(Report::from)?;

    Ok(match outcome {
        CommandOutcome::Success => ExitCode::SUCCESS,
        CommandOutcome::CommandExit { code } => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    })
}

/// Execute the CLI command, returning domain-specific errors.
async fn run(cli: &Cli, loaded: AppConfig) -> LiveswapResult<CommandOutcome> {
    let config = api::with_active_context(loaded).await;
    let collaborators = api::connect_collaborators(&config, &DefaultEnv::new());

    match &cli.command {
        Commands::Mode => {
            let report = api::mode(&config, &collaborators).await?;
            print_report(&report);
            Ok(CommandOutcome::Success)
        }
        Commands::Sync(args) => {
            let cancel = CancellationToken::new();
            let token = cancel.clone();
            let watcher = tokio::spawn(async move { cancel_on_ctrl_c(&token).await });
            let result = api::sync(&config, &collaborators, &sync_request(args), &cancel).await;
            watcher.abort();
            result
        }
    }
}

fn sync_request(args: &SyncArgs) -> SyncRequest {
    SyncRequest {
        pod: args.pod.clone(),
        container: args.container.clone(),
        container_id: args.container_id.clone(),
        namespace: args.namespace.clone(),
        delete: args.delete.clone(),
        copy: args.copy.clone(),
        run: args.run.clone(),
        restart: args.restart,
    }
}

async fn cancel_on_ctrl_c(cancel: &CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received, stopping after the current step");
            cancel.cancel();
        }
        Err(error) => warn!(%error, "cannot listen for interrupts"),
    }
}

#[expect(clippy::print_stdout, reason = "CLI output is the intended behaviour")]
fn print_report(report: &api::ModeReport) {
    println!("{report}");
}
