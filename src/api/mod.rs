//! Orchestration API for liveswap commands.
//!
//! Each command has a library-facing function here: [`mode`] and [`sync`].
//! They take library-owned types (not clap types), return
//! [`crate::error::Result`], and never print or exit; the CLI adapter
//! owns both.

mod connect;
mod mode;
mod sync;

pub use connect::{connect_collaborators, with_active_context};
pub use mode::{ModeReport, mode};
pub use sync::{SyncRequest, sync};

/// Outcome of a liveswap command.
///
/// Commands return either outright success or the exit code of a
/// user-supplied command that the CLI adapter maps to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command completed successfully (exit code 0).
    Success,
    /// The command completed but a user-supplied command exited with a
    /// non-zero code.
    CommandExit {
        /// The exit code reported by the transport.
        code: i64,
    },
}
