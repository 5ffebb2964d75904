//! Settings: catalog base URL, debug flag and request timeout.
//!
//! Read from `<config dir>/backstage-autocomplete/config.json` when present,
//! then overridden by whatever the command line (or its environment
//! fallbacks) supplied.

use crate::error::{CatalogError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR: &str = "backstage-autocomplete";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Backstage instance root, e.g. `https://backstage.example.com`.
    pub base_url: Option<String>,
    /// Dump raw catalog payloads to stderr.
    pub debug: bool,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: None,
            debug: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub debug: bool,
    pub timeout_secs: Option<u64>,
}

/// Default settings file location, if the platform has a config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

impl Settings {
    pub fn from_json(content: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| CatalogError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| CatalogError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded settings from {:?}", path);
        Self::from_json(&content, path)
    }

    /// Load from an explicit path, or the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_settings_path() {
                Some(path) => Self::load_from(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(base_url) = overrides.base_url {
            self.base_url = Some(base_url);
        }
        // A flag can only turn debugging on.
        self.debug |= overrides.debug;
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        self
    }

    /// The configured base URL without trailing slashes.
    pub fn require_base_url(&self) -> Result<&str> {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or(CatalogError::MissingBaseUrl)
    }

    /// Request timeout; `timeoutSecs: 0` disables it.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
