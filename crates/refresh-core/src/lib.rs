//! Self-update pipeline for tools distributed from a source-hosting platform.
//!
//! One cycle compares the local version descriptor with the one published
//! in the remote repository, downloads the repository archive when they
//! differ, and unpacks it over the local installation:
//! - Descriptor loading and remote descriptor fetching.
//! - Version comparison and dependency diffing.
//! - Resumable-by-skipping archive download with progress reporting.
//! - Archive installation.
//! - A per-session notification channel observing all of the above.

pub mod compare;
pub mod config;
pub mod deps;
pub mod descriptor;
pub mod download;
mod error;
pub mod fetch;
pub mod install;
pub mod notify;
pub mod session;
pub mod transport;
mod updater;

/// Pure version comparison.
pub use compare::{Comparison, compare};
/// Updater options and their defaults.
pub use config::UpdaterOptions;
/// Version descriptor model and local loader.
pub use descriptor::{SourceCoordinates, UpdateSource, VersionDescriptor, load_local};
/// Archive download stage.
pub use download::{DownloadOutcome, ProgressGate};
/// Error taxonomy shared by every stage.
pub use error::{ConfigError, ErrorCode, UpdateError};
/// Archive install stage.
pub use install::{InstallMode, InstallReport};
/// Notification model and channel.
pub use notify::{DownloadProgress, Notification, NotificationChannel, NotificationReceiver};
/// Session state.
pub use session::{Stage, UpdateSession};
/// Byte-stream transport seam and its HTTP implementation.
pub use transport::{HttpTransport, Transport, TransportError, TransportResponse};
/// Cycle orchestration.
pub use updater::{CycleOutcome, Updater};
