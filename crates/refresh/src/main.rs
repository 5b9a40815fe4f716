mod logging;
mod paths;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};
use refresh_core::{CycleOutcome, HttpTransport, Notification, NotificationChannel, Updater};

use crate::settings::Settings;

fn describe(notification: &Notification) -> String {
    let name = notification.name();
    match notification {
        Notification::UpToDate { version } => format!("{name} {version}"),
        Notification::OutOfDate { local, remote } => format!("{name} {local} -> {remote}"),
        Notification::DownloadStart { name: archive }
        | Notification::DownloadEnd { name: archive } => format!("{name} {archive}"),
        Notification::DownloadProgress(progress) => match progress.percent {
            Some(percent) => format!("{name} {} {percent:.2}%", progress.name),
            None => format!("{name} {} {} bytes", progress.name, progress.bytes_received),
        },
        Notification::Error { code, cause } => format!("{name} [{code}] {cause}"),
        Notification::DevCheckoutDetected
        | Notification::UpdateDownloaded
        | Notification::UpdateNotInstalled
        | Notification::UpdateExtracted
        | Notification::CycleComplete => name.to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(paths::settings_file);
    let settings = match settings_path.as_deref().map(Settings::load).transpose() {
        Ok(settings) => settings.unwrap_or_default(),
        Err(error) => {
            eprintln!("refresh: {error}");
            return ExitCode::FAILURE;
        }
    };

    let log_path = settings.log_file.clone().or_else(paths::log_file);
    logging::init_logging(
        settings.debug_logging,
        log_path.as_deref(),
        settings.max_log_size_bytes,
    );

    let transport = match HttpTransport::with_timeout(settings.http_timeout()) {
        Ok(transport) => transport,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let (channel, mut notifications) = NotificationChannel::new();
    let mut updater = match Updater::new(settings.updater, transport, channel) {
        Ok(updater) => updater,
        Err(error) => {
            error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("{}", describe(&notification));
        }
    });

    let result = updater.check().await;
    if let Ok(CycleOutcome::OutOfDate { .. } | CycleOutcome::Installed(_)) = &result
        && let Ok(changed) = updater.diff_dependencies()
        && !changed.is_empty()
    {
        let names: Vec<String> = changed.into_iter().collect();
        println!("dependencies changed: {}", names.join(", "));
    }

    drop(updater);
    let _ = printer.await;

    match result {
        Ok(outcome) => {
            info!("Update cycle finished: {outcome:?}");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
