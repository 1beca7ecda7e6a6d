//! Update archives built from host files.
//!
//! Each [`CopyMapping`] places one host file or directory at an absolute
//! path inside the container. Entries are written relative to `/` so the
//! same archive can be unpacked by `tar -C /` or uploaded to the root of a
//! daemon-managed container.

use std::fmt;
use std::io;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Metadata;
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

use crate::error::{ConfigError, FilesystemError, LiveswapError};

const DEFAULT_DIRECTORY_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

/// One host path to copy into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyMapping {
    local: Utf8PathBuf,
    container: Utf8PathBuf,
}

impl CopyMapping {
    /// Map `local` onto the absolute container path `container`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when either path is empty, when
    /// `container` is not absolute, or when it names the root itself.
    pub fn new(
        local: impl Into<Utf8PathBuf>,
        container: impl Into<Utf8PathBuf>,
    ) -> Result<Self, LiveswapError> {
        let local_path = local.into();
        let container_path = container.into();
        if local_path.as_str().is_empty() {
            return Err(invalid_copy("the local path is empty"));
        }
        if !container_path.as_str().starts_with('/') {
            return Err(invalid_copy(&format!(
                "container path '{container_path}' must be absolute"
            )));
        }
        if container_path.file_name().is_none() {
            return Err(invalid_copy("cannot replace the container root"));
        }
        Ok(Self {
            local: local_path,
            container: container_path,
        })
    }

    /// Host path.
    #[must_use]
    pub fn local(&self) -> &Utf8Path {
        &self.local
    }

    /// Absolute container path.
    #[must_use]
    pub fn container(&self) -> &Utf8Path {
        &self.container
    }

    fn archive_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.container.as_str().trim_start_matches('/'))
    }
}

impl FromStr for CopyMapping {
    type Err = LiveswapError;

    /// Parse `<local>:<container>`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (local, container) = raw
            .split_once(':')
            .ok_or_else(|| invalid_copy(&format!("'{raw}' is not <local>:<container>")))?;
        Self::new(local, container)
    }
}

impl fmt::Display for CopyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.container)
    }
}

fn invalid_copy(reason: &str) -> LiveswapError {
    LiveswapError::from(ConfigError::InvalidValue {
        field: String::from("copy"),
        reason: String::from(reason),
    })
}

/// Build a tar archive holding every mapping.
///
/// Directories are copied recursively with entries in name order.
///
/// # Errors
///
/// Returns `FilesystemError::NotFound` when a local path does not exist and
/// `FilesystemError::IoError` when it cannot be read.
pub fn build_update_archive(mappings: &[CopyMapping]) -> Result<Vec<u8>, LiveswapError> {
    let mut builder = Builder::new(vec![]);
    for mapping in mappings {
        append_mapping(&mut builder, mapping)
            .map_err(|error| map_io_error(mapping.local(), &error))?;
    }
    builder
        .finish()
        .and_then(|()| builder.into_inner())
        .map_err(|error| map_io_error(Utf8Path::new("."), &error))
}

fn map_io_error(path: &Utf8Path, error: &io::Error) -> LiveswapError {
    let std_path = path.as_std_path().to_path_buf();
    if error.kind() == io::ErrorKind::NotFound {
        return LiveswapError::from(FilesystemError::NotFound { path: std_path });
    }
    LiveswapError::from(FilesystemError::IoError {
        path: std_path,
        message: error.to_string(),
    })
}

fn append_mapping(builder: &mut Builder<Vec<u8>>, mapping: &CopyMapping) -> io::Result<()> {
    let local = mapping.local();
    let name = local
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "local path has no file name"))?;
    let parent = match local.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let parent_dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    let metadata = parent_dir.metadata(name)?;
    let destination = mapping.archive_path();

    if metadata.is_dir() {
        append_directory_header(builder, &destination, &metadata)?;
        let source = parent_dir.open_dir(name)?;
        append_directory_contents(builder, &source, &destination)
    } else {
        append_file(builder, &parent_dir, name, &destination)
    }
}

fn append_directory_contents(
    builder: &mut Builder<Vec<u8>>,
    directory: &Dir,
    destination: &Utf8Path,
) -> io::Result<()> {
    let mut entries = directory
        .entries()?
        .map(|entry_result| {
            let entry = entry_result?;
            Ok((entry.file_name()?, entry.file_type()?))
        })
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort_unstable_by(|left, right| left.0.cmp(&right.0));

    for (name, file_type) in entries {
        let entry_destination = destination.join(&name);
        if file_type.is_dir() {
            let metadata = directory.metadata(&name)?;
            append_directory_header(builder, &entry_destination, &metadata)?;
            let child = directory.open_dir(&name)?;
            append_directory_contents(builder, &child, &entry_destination)?;
        } else if file_type.is_file() {
            append_file(builder, directory, &name, &entry_destination)?;
        }
    }
    Ok(())
}

fn append_directory_header(
    builder: &mut Builder<Vec<u8>>,
    destination: &Utf8Path,
    metadata: &Metadata,
) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(metadata_mode(metadata, DEFAULT_DIRECTORY_MODE));
    header.set_cksum();
    builder.append_data(&mut header, format!("{}/", archive_name(destination)), io::empty())
}

fn append_file(
    builder: &mut Builder<Vec<u8>>,
    parent: &Dir,
    name: &str,
    destination: &Utf8Path,
) -> io::Result<()> {
    let metadata = parent.metadata(name)?;
    let mut file = parent.open(name)?;

    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(metadata.len());
    header.set_mode(metadata_mode(&metadata, DEFAULT_FILE_MODE));
    header.set_cksum();
    builder.append_data(&mut header, archive_name(destination), &mut file)
}

fn archive_name(path: &Utf8Path) -> String {
    path.as_str().replace('\\', "/")
}

#[cfg(unix)]
fn metadata_mode(metadata: &Metadata, _fallback: u32) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
const fn metadata_mode(_metadata: &Metadata, fallback: u32) -> u32 {
    fallback
}
