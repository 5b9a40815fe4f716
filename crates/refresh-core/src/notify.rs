//! Per-session notification channel.
//!
//! Each updater owns its own sender; the caller keeps the receiving half and
//! observes notifications in pipeline order. Sending never blocks the
//! pipeline, and a dropped receiver only discards notifications.

use tokio::sync::mpsc;

use crate::error::ErrorCode;

/// Snapshot of an in-flight archive download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub name: String,
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
    /// Percentage rounded to two decimals; `None` when the size is unknown.
    pub percent: Option<f64>,
}

impl DownloadProgress {
    #[must_use]
    pub fn new(name: &str, bytes_received: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.filter(|total| *total > 0).map(|total| {
            #[allow(clippy::cast_precision_loss)]
            let ratio = bytes_received as f64 / total as f64;
            ((ratio * 100.0).min(100.0) * 100.0).round() / 100.0
        });
        Self {
            name: name.to_string(),
            bytes_received,
            total_bytes,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    DevCheckoutDetected,
    UpToDate { version: String },
    OutOfDate { local: String, remote: String },
    DownloadStart { name: String },
    DownloadProgress(DownloadProgress),
    DownloadEnd { name: String },
    UpdateDownloaded,
    UpdateNotInstalled,
    UpdateExtracted,
    Error { code: ErrorCode, cause: String },
    CycleComplete,
}

impl Notification {
    /// Wire name of the notification.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::DevCheckoutDetected => "dev-checkout-detected",
            Self::UpToDate { .. } => "check.up-to-date",
            Self::OutOfDate { .. } => "check.out-dated",
            Self::DownloadStart { .. } => "download.start",
            Self::DownloadProgress(_) => "download.progress",
            Self::DownloadEnd { .. } => "download.end",
            Self::UpdateDownloaded => "update.downloaded",
            Self::UpdateNotInstalled => "update.not-installed",
            Self::UpdateExtracted => "update.extracted",
            Self::Error { .. } => "error",
            Self::CycleComplete => "cycle-complete",
        }
    }
}

pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

#[derive(Debug, Clone)]
pub struct NotificationChannel {
    sender: Option<mpsc::UnboundedSender<Notification>>,
    silent: bool,
}

impl NotificationChannel {
    /// Create a connected channel and its receiving half.
    #[must_use]
    pub fn new() -> (Self, NotificationReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
                silent: false,
            },
            receiver,
        )
    }

    /// A channel nobody listens to.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            sender: None,
            silent: false,
        }
    }

    #[must_use]
    pub fn silenced(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn emit(&self, notification: Notification) {
        if self.silent {
            return;
        }
        if let Some(sender) = &self.sender {
            let _ = sender.send(notification);
        }
    }
}
