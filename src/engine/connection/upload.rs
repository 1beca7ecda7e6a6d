//! Archive upload into container filesystems.

use std::future::Future;
use std::pin::Pin;

use bollard::query_parameters::{UploadToContainerOptions, UploadToContainerOptionsBuilder};
use bollard::{Docker, body_full};

use super::EngineConnector;
use crate::error::{ContainerError, LiveswapError};

/// Directory every update archive is unpacked into.
const ARCHIVE_ROOT: &str = "/";

/// Boxed future type returned by [`ContainerUploader`] implementors.
pub type UploadToContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to upload an archive payload into a container.
pub trait ContainerUploader: Send + Sync {
    /// Upload a tar archive payload into `container_id`.
    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> UploadToContainerFuture<'_>;
}

impl ContainerUploader for Docker {
    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> UploadToContainerFuture<'_> {
        let container_id_owned = String::from(container_id);

        Box::pin(async move {
            Self::upload_to_container(
                self,
                &container_id_owned,
                options,
                body_full(archive_bytes.into()),
            )
            .await
        })
    }
}

impl EngineConnector {
    /// Unpack a tar archive rooted at `/` into a container.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::UploadFailed` when the daemon rejects the
    /// upload.
    pub async fn upload_archive_async<U: ContainerUploader + ?Sized>(
        uploader: &U,
        container_id: &str,
        archive_bytes: Vec<u8>,
    ) -> Result<(), LiveswapError> {
        uploader
            .upload_to_container(container_id, Some(build_upload_options()), archive_bytes)
            .await
            .map_err(|error| {
                LiveswapError::from(ContainerError::UploadFailed {
                    container_id: String::from(container_id),
                    message: error.to_string(),
                })
            })
    }
}

fn build_upload_options() -> UploadToContainerOptions {
    UploadToContainerOptionsBuilder::default()
        .path(ARCHIVE_ROOT)
        .build()
}
