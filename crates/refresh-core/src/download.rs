//! Archive download with temporary-name writes.
//!
//! The archive is streamed to `_<name>` and renamed to `<name>` only once the
//! body is fully written, so an existence check on `<name>` never sees a
//! partial file. Two sessions writing the same archive name at once are not
//! coordinated; callers must give concurrent sessions distinct roots.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use log::{debug, info};
use tokio::io::AsyncWriteExt;

use crate::error::UpdateError;
use crate::notify::{DownloadProgress, Notification, NotificationChannel};
use crate::transport::Transport;

/// Prefix marking an archive that is still being written.
pub const PARTIAL_PREFIX: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The archive was already on disk; nothing was requested.
    AlreadyPresent,
    Downloaded,
}

#[must_use]
pub fn partial_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{PARTIAL_PREFIX}{name}"))
}

/// Minimum-interval gate for progress notifications.
#[derive(Debug, Clone)]
pub struct ProgressGate {
    min_interval: Option<Duration>,
    last_emitted: Option<Instant>,
}

impl ProgressGate {
    #[must_use]
    pub fn new(min_interval: Option<Duration>) -> Self {
        Self {
            min_interval,
            last_emitted: None,
        }
    }

    /// Whether a notification may go out at `now`. Admitting records `now`
    /// as the last emission.
    pub fn admit(&mut self, now: Instant) -> bool {
        let open = match (self.min_interval, self.last_emitted) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        };
        if open {
            self.last_emitted = Some(now);
        }
        open
    }
}

/// Download `url` into `dir/name` unless that file already exists.
///
/// # Errors
/// Returns a download error when the request or body stream fails or the
/// destination cannot be inspected or written. The partial file is left behind and removed
/// by the next attempt.
pub async fn download_archive<T>(
    transport: &T,
    url: &str,
    dir: &Path,
    name: &str,
    channel: &NotificationChannel,
    debounce: Option<Duration>,
) -> Result<DownloadOutcome, UpdateError>
where
    T: Transport + ?Sized,
{
    let dest = dir.join(name);
    let present = tokio::fs::try_exists(&dest).await.map_err(|error| {
        UpdateError::download_write("failed to check for existing archive", &dest, &error)
    })?;
    if present {
        debug!("{} already downloaded, skipping request", dest.display());
        return Ok(DownloadOutcome::AlreadyPresent);
    }

    let response = transport
        .get(url)
        .await
        .map_err(|error| UpdateError::download("archive request failed", error))?;

    let partial = partial_path(dir, name);
    match tokio::fs::remove_file(&partial).await {
        Ok(()) => debug!("Removed stale partial download {}", partial.display()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(UpdateError::download_write(
                "failed to remove stale partial download",
                &partial,
                &error,
            ));
        }
    }

    channel.emit(Notification::DownloadStart {
        name: name.to_string(),
    });

    let mut file = tokio::fs::File::create(&partial).await.map_err(|error| {
        UpdateError::download_write("failed to create download file", &partial, &error)
    })?;

    let total = response.content_length;
    let mut received: u64 = 0;
    let mut gate = ProgressGate::new(debounce);
    let mut held_back = None;

    let mut body = response.body;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|error| UpdateError::download("archive stream failed", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            UpdateError::download_write("failed to write download data", &partial, &error)
        })?;
        received += chunk.len() as u64;

        let progress = DownloadProgress::new(name, received, total);
        if gate.admit(Instant::now()) {
            held_back = None;
            channel.emit(Notification::DownloadProgress(progress));
        } else {
            held_back = Some(progress);
        }
    }
    if let Some(progress) = held_back {
        channel.emit(Notification::DownloadProgress(progress));
    }

    file.flush().await.map_err(|error| {
        UpdateError::download_write("failed to flush download file", &partial, &error)
    })?;
    drop(file);

    tokio::fs::rename(&partial, &dest).await.map_err(|error| {
        UpdateError::download_write("failed to publish downloaded archive", &dest, &error)
    })?;

    info!("Download complete: {} ({received} bytes)", dest.display());
    channel.emit(Notification::DownloadEnd {
        name: name.to_string(),
    });
    Ok(DownloadOutcome::Downloaded)
}
