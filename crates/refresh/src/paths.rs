use std::path::PathBuf;

const APP_DIR: &str = "refresh";

/// `<config dir>/refresh/settings.json`, when the platform has a config dir.
#[must_use]
pub fn settings_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("settings.json"))
}

/// `<data dir>/refresh/refresh.log`, when the platform has a data dir.
#[must_use]
pub fn log_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR).join("refresh.log"))
}
