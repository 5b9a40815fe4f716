use std::path::Path;

use thiserror::Error;

use crate::transport::TransportError;

/// Machine-readable classification carried by the `error` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DescriptorRead,
    DescriptorFormat,
    Download,
    ArchiveFormat,
    Filesystem,
    Precondition,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DescriptorRead => "descriptor-read",
            Self::DescriptorFormat => "descriptor-format",
            Self::Download => "download",
            Self::ArchiveFormat => "archive-format",
            Self::Filesystem => "filesystem",
            Self::Precondition => "precondition",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{context}: {source}")]
    DescriptorRead {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {details}")]
    DescriptorFormat {
        context: &'static str,
        details: String,
    },
    #[error("{context}: {source}")]
    Download {
        context: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("{context}: {source}")]
    DownloadWrite {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    ArchiveFormat {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("{context}: {source}")]
    Filesystem {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot {operation} before {missing}")]
    Precondition {
        operation: &'static str,
        missing: &'static str,
    },
}

impl UpdateError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DescriptorRead { .. } => ErrorCode::DescriptorRead,
            Self::DescriptorFormat { .. } => ErrorCode::DescriptorFormat,
            Self::Download { .. } | Self::DownloadWrite { .. } => ErrorCode::Download,
            Self::ArchiveFormat { .. } => ErrorCode::ArchiveFormat,
            Self::Filesystem { .. } => ErrorCode::Filesystem,
            Self::Precondition { .. } => ErrorCode::Precondition,
        }
    }

    pub(crate) fn descriptor_read(
        context: &'static str,
        path: &Path,
        source: &std::io::Error,
    ) -> Self {
        Self::DescriptorRead {
            context,
            source: with_path(path, source),
        }
    }

    pub(crate) fn descriptor_format(context: &'static str, details: impl Into<String>) -> Self {
        Self::DescriptorFormat {
            context,
            details: details.into(),
        }
    }

    pub(crate) fn download(context: &'static str, source: TransportError) -> Self {
        Self::Download { context, source }
    }

    pub(crate) fn download_write(
        context: &'static str,
        path: &Path,
        source: &std::io::Error,
    ) -> Self {
        Self::DownloadWrite {
            context,
            source: with_path(path, source),
        }
    }

    pub(crate) fn archive(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::ArchiveFormat { context, source }
    }

    pub(crate) fn filesystem(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::Filesystem {
            context,
            source: with_path(path, source),
        }
    }

    pub(crate) fn precondition(operation: &'static str, missing: &'static str) -> Self {
        Self::Precondition { operation, missing }
    }
}

fn with_path(path: &Path, source: &std::io::Error) -> std::io::Error {
    std::io::Error::new(source.kind(), format!("{}: {source}", path.display()))
}

/// Rejected updater configuration. Raised before any session exists, so it
/// is returned directly rather than notified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pathToJson must be a relative path, got {0}")]
    AbsoluteDescriptorPath(String),
    #[error("pathToJson cannot walk up the directory tree, got {0}")]
    ParentTraversal(String),
    #[error("{option} cannot be empty")]
    EmptyHost { option: &'static str },
    #[error("invalid updater options: {0}")]
    Parse(String),
}
