use std::collections::BTreeSet;

use crate::descriptor::VersionDescriptor;
use crate::error::UpdateError;

/// Prefix of the downloaded archive's file name.
pub const ARCHIVE_PREFIX: &str = "update";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Where a session is in the check/download/install pipeline. Recorded for
/// callers and logs; stage preconditions check the session's data instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Checking,
    DevCheckout,
    UpToDate,
    OutOfDate,
    Downloading,
    AlreadyPresent,
    Downloaded,
    Installing,
    Installed,
    Failed,
}

/// State of one check/download/install cycle.
///
/// `remote` and `archive_name` are written once, when the remote descriptor
/// arrives. The memoized fields stay `None` until computed.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    stage: Stage,
    local: Option<VersionDescriptor>,
    remote: Option<VersionDescriptor>,
    archive_name: Option<String>,
    has_git_checkout: Option<bool>,
    dependency_diff: Option<BTreeSet<String>>,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            local: None,
            remote: None,
            archive_name: None,
            has_git_checkout: None,
            dependency_diff: None,
        }
    }

    /// Session resumed from descriptors loaded elsewhere, ready for the
    /// download and install stages.
    ///
    /// # Errors
    /// Returns a descriptor-format error when the remote version cannot be
    /// used in an archive file name.
    pub fn with_descriptors(
        local: VersionDescriptor,
        remote: VersionDescriptor,
    ) -> Result<Self, UpdateError> {
        let mut session = Self::new();
        session.local = Some(local);
        session.set_remote(remote)?;
        session.stage = if session.is_up_to_date() {
            Stage::UpToDate
        } else {
            Stage::OutOfDate
        };
        Ok(session)
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn advance(&mut self, stage: Stage) {
        log::debug!("Update session {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    #[must_use]
    pub fn local(&self) -> Option<&VersionDescriptor> {
        self.local.as_ref()
    }

    #[must_use]
    pub fn remote(&self) -> Option<&VersionDescriptor> {
        self.remote.as_ref()
    }

    #[must_use]
    pub fn archive_name(&self) -> Option<&str> {
        self.archive_name.as_deref()
    }

    #[must_use]
    pub fn has_git_checkout(&self) -> Option<bool> {
        self.has_git_checkout
    }

    pub(crate) fn set_local(&mut self, local: VersionDescriptor) {
        self.local = Some(local);
    }

    pub(crate) fn set_remote(&mut self, remote: VersionDescriptor) -> Result<(), UpdateError> {
        if self.remote.is_some() {
            return Err(UpdateError::precondition(
                "replace the remote descriptor",
                "a new session is started",
            ));
        }
        self.archive_name = Some(archive_name(&remote.version)?);
        self.remote = Some(remote);
        Ok(())
    }

    /// Memoized dev-checkout probe.
    pub(crate) fn git_checkout_or(&mut self, probe: impl FnOnce() -> bool) -> bool {
        *self.has_git_checkout.get_or_insert_with(probe)
    }

    fn is_up_to_date(&self) -> bool {
        match (&self.local, &self.remote) {
            (Some(local), Some(remote)) => local.version == remote.version,
            _ => false,
        }
    }

    /// Remote dependency names the local descriptor does not match,
    /// computed once per session.
    ///
    /// # Errors
    /// Returns a precondition error until both descriptors are loaded.
    pub fn dependency_diff(&mut self) -> Result<&BTreeSet<String>, UpdateError> {
        if self.dependency_diff.is_none() {
            let (Some(local), Some(remote)) = (&self.local, &self.remote) else {
                return Err(UpdateError::precondition(
                    "diff dependencies",
                    "both descriptors are loaded",
                ));
            };
            self.dependency_diff = Some(crate::deps::diff_dependencies(local, remote));
        }
        Ok(self.dependency_diff.get_or_insert_with(BTreeSet::new))
    }
}

/// `update-<version>.zip`, refusing versions that would leave the root.
///
/// # Errors
/// Returns a descriptor-format error for versions containing path
/// separators or parent references.
pub fn archive_name(version: &str) -> Result<String, UpdateError> {
    if version.contains(['/', '\\']) || version.contains("..") {
        return Err(UpdateError::descriptor_format(
            "remote version cannot name an archive",
            format!("unsafe version string {version:?}"),
        ));
    }
    Ok(format!("{ARCHIVE_PREFIX}-{version}.{ARCHIVE_EXTENSION}"))
}
