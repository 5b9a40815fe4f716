//! Orchestration of one update cycle.
//!
//! `check` loads the local descriptor, fetches the remote one and compares
//! them. With `autoupdate` an out-of-date result flows straight into
//! `download` and then `install`; otherwise the caller invokes those stages.

use std::collections::BTreeSet;

use log::{debug, error};

use crate::compare::{Comparison, compare};
use crate::config::{DESCRIPTOR_FILE, UpdaterOptions};
use crate::descriptor::load_local;
use crate::download::{DownloadOutcome, download_archive};
use crate::error::{ConfigError, UpdateError};
use crate::fetch::{archive_path, fetch_remote, metadata_path};
use crate::install::{InstallReport, install};
use crate::notify::{Notification, NotificationChannel};
use crate::session::{Stage, UpdateSession};
use crate::transport::{Transport, endpoint};

/// Where a stage left the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A dev checkout was found; nothing was fetched.
    DevCheckout,
    UpToDate { version: String },
    /// Newer remote, left for the caller to download.
    OutOfDate { local: String, remote: String },
    /// Archive on disk, left for the caller to install.
    Downloaded(DownloadOutcome),
    Installed(InstallReport),
}

pub struct Updater<T> {
    options: UpdaterOptions,
    transport: T,
    channel: NotificationChannel,
    session: UpdateSession,
}

impl<T: Transport> Updater<T> {
    /// # Errors
    /// Returns an error when the options fail validation.
    pub fn new(
        options: UpdaterOptions,
        transport: T,
        channel: NotificationChannel,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let silent = options.silent || channel.is_silent();
        Ok(Self {
            options,
            transport,
            channel: channel.silenced(silent),
            session: UpdateSession::new(),
        })
    }

    /// Continue from a session whose descriptors were obtained elsewhere.
    #[must_use]
    pub fn with_session(mut self, session: UpdateSession) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn options(&self) -> &UpdaterOptions {
        &self.options
    }

    #[must_use]
    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    /// Start a fresh cycle: compare local and remote versions and, with
    /// `autoupdate`, download and install an out-of-date release.
    ///
    /// # Errors
    /// Returns the first stage error; it has already been notified.
    pub async fn check(&mut self) -> Result<CycleOutcome, UpdateError> {
        self.session = UpdateSession::new();
        let result = self.run_check().await;
        self.settle(result)
    }

    /// Download the remote release archive unless it is already on disk.
    ///
    /// # Errors
    /// Returns a precondition error before a successful check, otherwise the
    /// first stage error. Errors have already been notified.
    pub async fn download(&mut self) -> Result<CycleOutcome, UpdateError> {
        let result = self.run_download().await;
        self.settle(result)
    }

    /// Extract the downloaded archive over the installation root.
    ///
    /// # Errors
    /// Returns a precondition error before the remote version is known or
    /// while its archive is not on disk, otherwise the extraction error.
    /// Errors have already been notified.
    pub async fn install(&mut self) -> Result<InstallReport, UpdateError> {
        let result = self.run_install().await;
        self.settle(result)
    }

    /// Remote dependencies the local descriptor does not match.
    ///
    /// # Errors
    /// Returns a precondition error until a check has loaded both
    /// descriptors.
    pub fn diff_dependencies(&mut self) -> Result<BTreeSet<String>, UpdateError> {
        let result = self.session.dependency_diff().cloned();
        self.settle(result)
    }

    async fn run_check(&mut self) -> Result<CycleOutcome, UpdateError> {
        self.session.advance(Stage::Checking);

        if self.options.check_git {
            let marker = self.options.dev_checkout_marker();
            if self.session.git_checkout_or(|| marker.exists()) {
                debug!("Dev checkout at {}, skipping update", marker.display());
                self.session.advance(Stage::DevCheckout);
                self.channel.emit(Notification::DevCheckoutDetected);
                return Ok(CycleOutcome::DevCheckout);
            }
        }

        let local = load_local(&self.options.local_descriptor_path()).await?;
        let path = metadata_path(
            local.source_coordinates()?,
            &self.options.descriptor_url_prefix(),
            DESCRIPTOR_FILE,
        );
        let remote = fetch_remote(&self.transport, &self.options.jsonhost, &path).await?;
        let comparison = compare(&local, &remote);
        self.session.set_local(local);
        self.session.set_remote(remote)?;

        match comparison {
            Comparison::UpToDate(version) => {
                self.session.advance(Stage::UpToDate);
                self.channel.emit(Notification::UpToDate {
                    version: version.clone(),
                });
                self.channel.emit(Notification::CycleComplete);
                Ok(CycleOutcome::UpToDate { version })
            }
            Comparison::OutOfDate { local, remote } => {
                self.session.advance(Stage::OutOfDate);
                self.channel.emit(Notification::OutOfDate {
                    local: local.clone(),
                    remote: remote.clone(),
                });
                if self.options.autoupdate {
                    self.run_download().await
                } else {
                    Ok(CycleOutcome::OutOfDate { local, remote })
                }
            }
        }
    }

    async fn run_download(&mut self) -> Result<CycleOutcome, UpdateError> {
        let (url, name) = {
            let (Some(local), Some(name)) = (self.session.local(), self.session.archive_name())
            else {
                return Err(UpdateError::precondition(
                    "download the update",
                    "the remote descriptor is fetched",
                ));
            };
            let url = endpoint(
                &self.options.contenthost,
                &archive_path(local.source_coordinates()?),
            );
            (url, name.to_string())
        };

        self.session.advance(Stage::Downloading);
        let outcome = download_archive(
            &self.transport,
            &url,
            &self.options.root,
            &name,
            &self.channel,
            self.options.progress_debounce(),
        )
        .await?;

        match outcome {
            DownloadOutcome::AlreadyPresent => {
                self.session.advance(Stage::AlreadyPresent);
                self.channel.emit(Notification::UpdateNotInstalled);
            }
            DownloadOutcome::Downloaded => {
                self.session.advance(Stage::Downloaded);
                self.channel.emit(Notification::UpdateDownloaded);
            }
        }

        if self.options.autoupdate {
            self.run_install().await.map(CycleOutcome::Installed)
        } else {
            Ok(CycleOutcome::Downloaded(outcome))
        }
    }

    async fn run_install(&mut self) -> Result<InstallReport, UpdateError> {
        let archive = match self.session.archive_name() {
            Some(name) => self.options.root.join(name),
            None => {
                return Err(UpdateError::precondition(
                    "install the update",
                    "the remote descriptor is fetched",
                ));
            }
        };
        let present = tokio::fs::try_exists(&archive).await.map_err(|error| {
            UpdateError::filesystem("failed to check for downloaded archive", &archive, &error)
        })?;
        if !present {
            return Err(UpdateError::precondition(
                "install the update",
                "the archive is downloaded",
            ));
        }

        self.session.advance(Stage::Installing);
        let report = install(&archive, &self.options.root, self.options.install_mode).await?;
        self.session.advance(Stage::Installed);
        self.channel.emit(Notification::UpdateExtracted);
        self.channel.emit(Notification::CycleComplete);
        Ok(report)
    }

    fn settle<R>(&mut self, result: Result<R, UpdateError>) -> Result<R, UpdateError> {
        if let Err(failure) = &result {
            let code = failure.code();
            if self.options.devmode {
                error!("Update cycle failed [{code}]: {failure}");
            } else {
                debug!("Update cycle failed [{code}]: {failure}");
            }
            self.session.advance(Stage::Failed);
            self.channel.emit(Notification::Error {
                code,
                cause: failure.to_string(),
            });
        }
        result
    }
}
