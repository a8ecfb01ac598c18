use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MediaKind;

pub const DEFAULT_CONFIG_FILE: &str = "media-batch-player.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config format: {0}")]
    Parse(#[from] serde_json::Error),
}

/// External video player invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: String,
    pub extra_args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "mpv".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Application configuration. Read once at startup, never written back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub urls: Vec<String>,
    pub storage_dir: PathBuf,
    pub media_kinds: Vec<MediaKind>,
    pub force_extension_for_kind: Option<MediaKind>,
    pub poll_interval_ms: u64,
    pub allow_over_metered: bool,
    pub allow_over_roaming: bool,
    pub player: PlayerConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            urls: vec![
                "https://gcmenu.com/img/Branding_old.mp4".to_string(),
                "https://gcmenu.com/img/mchdv.mp4".to_string(),
            ],
            storage_dir: PathBuf::from("downloads"),
            media_kinds: vec![MediaKind::Video, MediaKind::Image],
            force_extension_for_kind: None,
            poll_interval_ms: 500,
            allow_over_metered: true,
            allow_over_roaming: true,
            player: PlayerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json_str(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}
