//! Live-update dispatch engine for container development loops.
//!
//! `liveswap` decides, for each changed build target, how to get the change
//! running: patch the running containers in place when the environment
//! allows it, or fall back to a full image rebuild and redeploy.
//!
//! # Architecture
//!
//! A [`session::Session`] is assembled once per run. It detects the cluster
//! environment, probes what the runtime supports and resolves the update
//! mode. Each target is then handed to a composite dispatcher that tries
//! the build strategies in priority order: live update, full image,
//! compose, local. Live updates go through one of three container updaters
//! sharing a strict delete, copy, run, restart protocol.
//!
//! # Modules
//!
//! - [`api`]: Library-facing orchestration for the `mode` and `sync` commands
//! - [`archive`]: Tar archives built from host paths
//! - [`cluster`]: Cluster environment detection and the `kubectl` client
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`dispatch`]: Priority-ordered strategy fallback
//! - [`engine`]: Container daemon connection and primitives
//! - [`error`]: Semantic error types for the application
//! - [`mode`]: Update-mode resolution
//! - [`model`]: Targets, container handles and update payloads
//! - [`output`]: Line-buffered command output forwarding
//! - [`runtime`]: Runtime capability probing
//! - [`session`]: The composition root
//! - [`strategy`]: Build-and-deploy strategies
//! - [`update`]: In-place container updaters

pub mod api;
pub mod archive;
pub mod cluster;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod mode;
pub mod model;
pub mod output;
pub mod runtime;
pub mod session;
pub mod strategy;
pub mod update;

#[cfg(test)]
mod testing;
