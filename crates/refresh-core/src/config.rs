use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::install::InstallMode;

pub const DEFAULT_JSON_HOST: &str = "raw.githubusercontent.com";
pub const DEFAULT_CONTENT_HOST: &str = "codeload.github.com";

/// File name of the version descriptor, both locally and on the metadata host.
pub const DESCRIPTOR_FILE: &str = "package.json";

/// Marker whose presence in the root means the install is a dev checkout.
pub const DEV_CHECKOUT_MARKER: &str = ".git";

#[derive(Debug, Clone, Deserialize)]
pub struct UpdaterOptions {
    /// Installation root: holds the descriptor subtree, the downloaded
    /// archive, and receives the extracted files.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default, rename = "pathToJson")]
    pub path_to_json: String,

    #[serde(default)]
    pub autoupdate: bool,

    #[serde(default = "default_true", rename = "checkgit", alias = "check_git")]
    pub check_git: bool,

    #[serde(default = "default_json_host")]
    pub jsonhost: String,

    #[serde(default = "default_content_host")]
    pub contenthost: String,

    #[serde(default)]
    pub devmode: bool,

    #[serde(default, rename = "progressDebounce")]
    pub progress_debounce_ms: Option<u64>,

    #[serde(default)]
    pub silent: bool,

    #[serde(default, rename = "installMode")]
    pub install_mode: InstallMode,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_json_host() -> String {
    DEFAULT_JSON_HOST.to_string()
}

fn default_content_host() -> String {
    DEFAULT_CONTENT_HOST.to_string()
}

impl Default for UpdaterOptions {
    fn default() -> Self {
        Self {
            root: default_root(),
            path_to_json: String::new(),
            autoupdate: false,
            check_git: true,
            jsonhost: default_json_host(),
            contenthost: default_content_host(),
            devmode: false,
            progress_debounce_ms: None,
            silent: false,
            install_mode: InstallMode::default(),
        }
    }
}

impl UpdaterOptions {
    /// Parse options from their JSON form, then validate them.
    ///
    /// # Errors
    /// Returns an error for malformed JSON or options that fail [`Self::validate`].
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let options: Self =
            serde_json::from_str(content).map_err(|error| ConfigError::Parse(error.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// # Errors
    /// Returns an error when `pathToJson` is absolute or walks upwards, or a
    /// host is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let relative = Path::new(&self.path_to_json);
        if relative.has_root() || relative.is_absolute() {
            return Err(ConfigError::AbsoluteDescriptorPath(self.path_to_json.clone()));
        }
        if relative
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(ConfigError::ParentTraversal(self.path_to_json.clone()));
        }
        if self.jsonhost.trim().is_empty() {
            return Err(ConfigError::EmptyHost { option: "jsonhost" });
        }
        if self.contenthost.trim().is_empty() {
            return Err(ConfigError::EmptyHost {
                option: "contenthost",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn progress_debounce(&self) -> Option<Duration> {
        self.progress_debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn local_descriptor_path(&self) -> PathBuf {
        self.root.join(&self.path_to_json).join(DESCRIPTOR_FILE)
    }

    /// `pathToJson` in URL form: forward slashes, no leading `./`, and a
    /// trailing slash when non-empty.
    #[must_use]
    pub fn descriptor_url_prefix(&self) -> String {
        let segments: Vec<&str> = self
            .path_to_json
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        if segments.is_empty() {
            String::new()
        } else {
            format!("{}/", segments.join("/"))
        }
    }

    #[must_use]
    pub fn dev_checkout_marker(&self) -> PathBuf {
        self.root.join(DEV_CHECKOUT_MARKER)
    }
}
