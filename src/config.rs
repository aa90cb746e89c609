//! Dashboard configuration
//!
//! Stored as JSON. Every field has a default, so a partial or missing file
//! still yields a usable config.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::ExportFormat;
use crate::reconcile::EngineOptions;
use crate::view::SortKey;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// No file logging when unset
    pub dir: Option<PathBuf>,
    pub app_name: String,
    /// Trace, debug, info, warn or error
    pub level: String,
    pub max_file_bytes: u64,
    pub buffer_lines: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: None,
            app_name: "course-dashboard".to_string(),
            level: "info".to_string(),
            max_file_bytes: 2 * 1024 * 1024,
            buffer_lines: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Re-fetch the course after mutations settle
    pub refresh_after_mutation: bool,
    /// Pointer travel before a press becomes a drag
    pub drag_threshold_px: i32,
    pub default_sort: SortKey,
    pub export_format: ExportFormat,
    pub log: LogConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_after_mutation: true,
            drag_threshold_px: dragdrop::DRAG_THRESHOLD_PX,
            default_sort: SortKey::default(),
            export_format: ExportFormat::default(),
            log: LogConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Read the config, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("[Config] {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_error)?;
        log::debug!("[Config] Saved {}", path.display());
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            refresh_after_mutation: self.refresh_after_mutation,
        }
    }
}
