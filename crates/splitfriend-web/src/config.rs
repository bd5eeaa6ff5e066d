//! Client configuration

use serde::{Deserialize, Serialize};
use splitfriend_common::{Result, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::theme::{DEFAULT_THEME, THEME_STORAGE_KEY};

/// Page-side client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// SplitFriend server the push API lives on
    pub server_url: Url,

    /// Directory holding local storage
    pub data_dir: PathBuf,

    /// Storage key the theme is kept under
    pub theme_storage_key: String,

    /// Theme used when none is stored
    pub default_theme: String,

    /// Worker script path, relative to the server
    pub worker_script: String,

    /// How long plain toasts stay visible, in milliseconds
    pub toast_duration_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("splitfriend"),
            theme_storage_key: THEME_STORAGE_KEY.to_string(),
            default_theme: DEFAULT_THEME.to_string(),
            worker_script: splitfriend_sw::WORKER_SCRIPT_PATH.to_string(),
            toast_duration_ms: 3000,
        }
    }
}

fn default_server_url() -> Url {
    Url::parse("http://localhost:8080/").expect("static URL is valid")
}

impl ClientConfig {
    /// Load config from the given path, returning defaults if missing or unreadable
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save config to the given path
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("serializing client config")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// File backing local storage
    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join("local-storage.json")
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}
