use log::debug;

use crate::descriptor::{SourceCoordinates, VersionDescriptor};
use crate::error::UpdateError;
use crate::transport::{Transport, endpoint};

/// Path of the remote descriptor on the metadata host.
#[must_use]
pub fn metadata_path(source: SourceCoordinates<'_>, descriptor_prefix: &str, file: &str) -> String {
    format!(
        "{}/{}/{descriptor_prefix}{file}",
        source.repo, source.branch
    )
}

/// Path of the repository archive on the content host.
#[must_use]
pub fn archive_path(source: SourceCoordinates<'_>) -> String {
    format!("{}/zip/{}", source.repo, source.branch)
}

/// Fetch and parse the remote descriptor with a single GET.
///
/// # Errors
/// Returns a download error when the host cannot be reached or answers with
/// a failure status, and a descriptor-format error when the body is not a
/// valid descriptor.
pub async fn fetch_remote<T>(
    transport: &T,
    host: &str,
    path: &str,
) -> Result<VersionDescriptor, UpdateError>
where
    T: Transport + ?Sized,
{
    let url = endpoint(host, path);
    debug!("Fetching remote descriptor from {url}");

    let body = transport
        .get(&url)
        .await
        .map_err(|error| UpdateError::download("remote descriptor request failed", error))?
        .collect_body()
        .await
        .map_err(|error| UpdateError::download("remote descriptor download failed", error))?;

    VersionDescriptor::parse(&body)
}
