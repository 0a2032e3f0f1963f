/// Configuration for the boxboard command line.
/// Reads config.json from ~/.config/boxboard/config.json (or platform equivalent).
use boxboard_core::config::BoardDefaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Root directory of the local document store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Identity used as the viewer, and as the owner of created boards.
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub defaults: BoardDefaults,
}

impl CliConfig {
    /// Data directory from the file, or the platform data dir.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Default config path: ~/.config/boxboard/config.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("boxboard")
        .join("config.json")
}

/// Default store root: ~/.local/share/boxboard
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("boxboard")
}

/// Load config from path. Returns default if the file doesn't exist or is invalid.
pub fn load_config(path: &Path) -> CliConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("[boxboard.cli] Failed to parse config {}: {}", path.display(), e);
            CliConfig::default()
        }),
        Err(_) => {
            log::info!("[boxboard.cli] No config at {}, using defaults", path.display());
            CliConfig::default()
        }
    }
}
