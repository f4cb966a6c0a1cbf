use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, CODEC_PRIORITY, DEFAULT_DIMENSION_BACKOFF_MS, DEFAULT_RECORDING_FPS,
    DEFAULT_STABILIZATION_DELAY_MS, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TIMESLICE_MS,
    DOWNLOAD_FILENAME_PREFIX,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Tracker settings shared by the annotation loop, the recorder, and the shell.
///
/// Missing fields fall back to their defaults so older settings files keep
/// loading after new options are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tally dominant expressions. Off gives the annotation-only variant.
    pub track_counts: bool,
    /// Draw the frame (and annotations) as a mirror view.
    pub mirror: bool,
    pub tick_interval_ms: u64,
    pub dimension_backoff_ms: u64,
    pub stabilization_delay_ms: u64,
    pub timeslice_ms: u64,
    pub recording_fps: u32,
    pub codec_priority: Vec<String>,
    pub filename_prefix: String,
    pub min_confidence: f64,
    pub input_size: u32,
    /// Drawing surface size; `None` follows the capture resolution.
    pub display_size: Option<(u32, u32)>,
    pub model_load_attempts: u32,
    pub model_load_backoff_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_counts: true,
            mirror: true,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            dimension_backoff_ms: DEFAULT_DIMENSION_BACKOFF_MS,
            stabilization_delay_ms: DEFAULT_STABILIZATION_DELAY_MS,
            timeslice_ms: DEFAULT_TIMESLICE_MS,
            recording_fps: DEFAULT_RECORDING_FPS,
            codec_priority: CODEC_PRIORITY.iter().map(|c| c.to_string()).collect(),
            filename_prefix: DOWNLOAD_FILENAME_PREFIX.to_string(),
            min_confidence: 0.5,
            input_size: 416,
            display_size: None,
            model_load_attempts: 5,
            model_load_backoff_ms: 1000,
        }
    }
}

impl TrackerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn dimension_backoff(&self) -> Duration {
        Duration::from_millis(self.dimension_backoff_ms.max(1))
    }

    pub fn stabilization_delay(&self) -> Duration {
        Duration::from_millis(self.stabilization_delay_ms)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms.max(1))
    }

    pub fn model_load_backoff(&self) -> Duration {
        Duration::from_millis(self.model_load_backoff_ms)
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads the user settings file, falling back to defaults on any problem.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("{e}; using default settings");
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Failed to save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}
