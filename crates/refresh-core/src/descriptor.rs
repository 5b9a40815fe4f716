use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::UpdateError;

/// Version metadata shared by the local install and the remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDescriptor {
    pub version: String,
    pub update_source: Option<UpdateSource>,
    pub dependencies: BTreeMap<String, String>,
}

/// The `auto-updater` block. Either field may be absent until a remote
/// fetch actually needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateSource {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Fully resolved update coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceCoordinates<'a> {
    pub repo: &'a str,
    pub branch: &'a str,
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "auto-updater")]
    update_source: Option<UpdateSource>,
    #[serde(default)]
    dependencies: Option<BTreeMap<String, String>>,
}

impl VersionDescriptor {
    /// Parse a descriptor document. Unknown fields are ignored.
    ///
    /// # Errors
    /// Returns a descriptor-format error when the document is not valid JSON,
    /// a consumed field has the wrong type, or `version` is missing or blank.
    pub fn parse(content: &[u8]) -> Result<Self, UpdateError> {
        let raw: RawDescriptor = serde_json::from_slice(content).map_err(|error| {
            UpdateError::descriptor_format("failed to parse version descriptor", error.to_string())
        })?;

        let version = raw
            .version
            .filter(|version| !version.trim().is_empty())
            .ok_or_else(|| {
                UpdateError::descriptor_format(
                    "invalid version descriptor",
                    "missing required field `version`",
                )
            })?;

        Ok(Self {
            version,
            update_source: raw.update_source,
            dependencies: raw.dependencies.unwrap_or_default(),
        })
    }

    /// Coordinates of the remote repository this install updates from.
    ///
    /// # Errors
    /// Returns a descriptor-format error when `auto-updater.repo` or
    /// `auto-updater.branch` is missing or blank.
    pub fn source_coordinates(&self) -> Result<SourceCoordinates<'_>, UpdateError> {
        let source = self.update_source.as_ref().ok_or_else(|| {
            UpdateError::descriptor_format(
                "local descriptor has no update source",
                "missing `auto-updater` block",
            )
        })?;
        let repo = non_blank(source.repo.as_deref()).ok_or_else(|| {
            UpdateError::descriptor_format(
                "local descriptor has no update source",
                "missing `auto-updater.repo`",
            )
        })?;
        let branch = non_blank(source.branch.as_deref()).ok_or_else(|| {
            UpdateError::descriptor_format(
                "local descriptor has no update source",
                "missing `auto-updater.branch`",
            )
        })?;
        Ok(SourceCoordinates { repo, branch })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Read and parse the local descriptor.
///
/// # Errors
/// Returns a descriptor-read error when the file cannot be read and a
/// descriptor-format error when its content is invalid.
pub async fn load_local(path: &Path) -> Result<VersionDescriptor, UpdateError> {
    let content = tokio::fs::read(path).await.map_err(|error| {
        UpdateError::descriptor_read("failed to read local version descriptor", path, &error)
    })?;
    VersionDescriptor::parse(&content)
}
