use crate::descriptor::VersionDescriptor;

/// Result of comparing the local and remote versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    UpToDate(String),
    OutOfDate { local: String, remote: String },
}

impl Comparison {
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate(_))
    }
}

/// Versions are opaque: any difference, including an older remote, is
/// reported as out of date.
#[must_use]
pub fn compare(local: &VersionDescriptor, remote: &VersionDescriptor) -> Comparison {
    if local.version == remote.version {
        Comparison::UpToDate(remote.version.clone())
    } else {
        Comparison::OutOfDate {
            local: local.version.clone(),
            remote: remote.version.clone(),
        }
    }
}
