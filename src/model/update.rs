//! Live-update deltas and the single-use update payload derived from them.

use std::collections::BTreeSet;

use super::ContainerCommand;

/// The file and command delta computed for one target in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveUpdateDelta {
    files_to_delete: BTreeSet<String>,
    archive: Vec<u8>,
    commands: Vec<ContainerCommand>,
    hot_reload: bool,
    requires_rebuild: bool,
}

impl LiveUpdateDelta {
    /// Create an empty delta that allows hot reload.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hot_reload: true,
            ..Self::default()
        }
    }

    /// Set the container paths to remove.
    #[must_use]
    pub fn with_files_to_delete<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files_to_delete = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the tar archive (rooted at `/`) to unpack into the container.
    #[must_use]
    pub fn with_archive(mut self, archive: Vec<u8>) -> Self {
        self.archive = archive;
        self
    }

    /// Set the commands to run after the files are in place.
    #[must_use]
    pub fn with_commands(mut self, commands: Vec<ContainerCommand>) -> Self {
        self.commands = commands;
        self
    }

    /// Control whether the update may complete without a container restart.
    #[must_use]
    pub const fn with_hot_reload(mut self, hot_reload: bool) -> Self {
        self.hot_reload = hot_reload;
        self
    }

    /// Mark the delta as touching a build-time dependency.
    #[must_use]
    pub const fn requiring_rebuild(mut self) -> Self {
        self.requires_rebuild = true;
        self
    }

    /// Whether the change can only be delivered by a full rebuild.
    #[must_use]
    pub const fn requires_rebuild(&self) -> bool {
        self.requires_rebuild
    }

    /// Return the paths scheduled for removal.
    #[must_use]
    pub const fn files_to_delete(&self) -> &BTreeSet<String> {
        &self.files_to_delete
    }

    /// Return the commands of the delta.
    #[must_use]
    pub fn commands(&self) -> &[ContainerCommand] {
        &self.commands
    }
}

/// Payload of one in-place container update.
///
/// Produced once per build cycle and consumed by a single dispatch. A failed
/// spec is never retried; the next cycle produces a fresh one.
#[derive(Debug, PartialEq, Eq)]
pub struct UpdateSpec {
    files_to_delete: Vec<String>,
    archive_to_copy: Vec<u8>,
    commands: Vec<ContainerCommand>,
    hot_reload_allowed: bool,
}

impl UpdateSpec {
    /// Create an update payload.
    #[must_use]
    pub fn new(
        files_to_delete: Vec<String>,
        archive_to_copy: Vec<u8>,
        commands: Vec<ContainerCommand>,
        hot_reload_allowed: bool,
    ) -> Self {
        Self {
            files_to_delete,
            archive_to_copy,
            commands,
            hot_reload_allowed,
        }
    }

    /// Produce this cycle's payload from a target delta.
    #[must_use]
    pub fn from_delta(delta: &LiveUpdateDelta) -> Self {
        Self::new(
            delta.files_to_delete.iter().cloned().collect(),
            delta.archive.clone(),
            delta.commands.clone(),
            delta.hot_reload,
        )
    }

    /// Return the paths to remove, in deterministic order.
    #[must_use]
    pub fn files_to_delete(&self) -> &[String] {
        &self.files_to_delete
    }

    /// Return the tar archive bytes.
    #[must_use]
    pub fn archive_to_copy(&self) -> &[u8] {
        &self.archive_to_copy
    }

    /// Return the commands to run, in order.
    #[must_use]
    pub fn commands(&self) -> &[ContainerCommand] {
        &self.commands
    }

    /// Whether the update may complete without restarting the container.
    #[must_use]
    pub const fn hot_reload_allowed(&self) -> bool {
        self.hot_reload_allowed
    }
}
