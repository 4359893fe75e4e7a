use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::thumbnail::THUMB_SIZE;

pub const ENDPOINT_ENV: &str = "THUMBEDIT_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/process";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Default, Serialize, Deserialize)]
/// Persisted UI/application settings for the thumbnail editor.
pub struct AppConfig {
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub browse_path: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub thumbnail_max: Option<u32>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("thumbedit").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(&path, s);
        }
    }

    /// Edit endpoint: `THUMBEDIT_ENDPOINT`, then the config file, then the default.
    pub fn resolve_endpoint(&self) -> String {
        resolve_endpoint_with(std::env::var(ENDPOINT_ENV).ok(), self.endpoint.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_TIMEOUT_SECS)
                .max(1),
        )
    }

    pub fn thumbnail_max(&self) -> u32 {
        self.thumbnail_max.unwrap_or(THUMB_SIZE).max(1)
    }
}

fn resolve_endpoint_with(env: Option<String>, file: Option<&str>) -> String {
    env.as_deref()
        .or(file)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_ENDPOINT)
        .to_string()
}
