// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CaptureBackendType;
use crate::backends::camera::types::FourCc;
use crate::backends::virtual_camera::OutputFormat;
use crate::constants::{formats, timing, v4l2};
use crate::errors::{AppError, AppResult};
use crate::selection::Level;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directory name under the user config dir
const CONFIG_DIR: &str = "webcam-stream";
const CONFIG_FILE: &str = "config.json";

/// Last selection of each level, restored on startup
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub device: Option<String>,
    pub format: Option<String>,
    pub resolution: Option<String>,
    pub frame_rate: Option<String>,
}

impl SelectionSettings {
    pub fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::Device => self.device.as_deref(),
            Level::Format => self.format.as_deref(),
            Level::Resolution => self.resolution.as_deref(),
            Level::FrameRate => self.frame_rate.as_deref(),
        }
    }

    pub fn set(&mut self, level: Level, value: Option<String>) {
        match level {
            Level::Device => self.device = value,
            Level::Format => self.format = value,
            Level::Resolution => self.resolution = value,
            Level::FrameRate => self.frame_rate = value,
        }
    }
}

/// Virtual output settings
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// v4l2loopback device node
    pub device: String,
    pub format: OutputFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video10".to_string(),
            format: OutputFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture backend to use (V4L2 or mock)
    pub backend: CaptureBackendType,
    /// Pixel formats offered for selection, highest priority first
    pub supported_formats: Vec<String>,
    /// mmap buffers per V4L2 reader
    pub buffer_count: u32,
    /// Interval between frame reader cycles
    pub read_interval_ms: u64,
    pub last_selection: SelectionSettings,
    pub output: OutputSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CaptureBackendType::default(),
            supported_formats: formats::DEFAULT_SUPPORTED
                .iter()
                .map(|f| f.to_string())
                .collect(),
            buffer_count: v4l2::DEFAULT_BUFFER_COUNT,
            read_interval_ms: timing::DEFAULT_READ_INTERVAL_MS,
            last_selection: SelectionSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location
    ///
    /// A missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory, using defaults");
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("no config directory".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Allow-list as format codes; invalid entries are skipped
    pub fn supported_fourccs(&self) -> Vec<FourCc> {
        self.supported_formats
            .iter()
            .filter_map(|f| match f.parse::<FourCc>() {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!(error = %e, "Ignoring supported format entry");
                    None
                }
            })
            .collect()
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_fourccs_skip_invalid() {
        let config = Config {
            supported_formats: vec!["YUY2".into(), "NONE".into(), "toolong".into(), "NV12".into()],
            ..Config::default()
        };
        assert_eq!(config.supported_fourccs(), vec![FourCc::YUY2, FourCc::NV12]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"buffer_count": 8}"#).unwrap();
        assert_eq!(config.buffer_count, 8);
        assert_eq!(config.read_interval_ms, timing::DEFAULT_READ_INTERVAL_MS);
        assert_eq!(config.backend, CaptureBackendType::V4l2);
    }

    #[test]
    fn test_selection_settings_by_level() {
        let mut selection = SelectionSettings::default();
        selection.set(Level::Resolution, Some("640x480".into()));
        assert_eq!(selection.get(Level::Resolution), Some("640x480"));
        assert_eq!(selection.get(Level::Device), None);
    }
}
