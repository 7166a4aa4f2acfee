use crate::error::ConfigError;
use crate::notifications::DEFAULT_MAX_NOTIFICATIONS;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_AUTOSAVE_QUIET_MS: u64 = 500;
pub const DEFAULT_SLASH_TRIGGER: char = '/';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub autosave_quiet_ms: u64,
    pub slash_trigger: char,
    pub database_path: Option<PathBuf>,
    pub asset_dir: Option<PathBuf>,
    pub max_notifications: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_quiet_ms: DEFAULT_AUTOSAVE_QUIET_MS,
            slash_trigger: DEFAULT_SLASH_TRIGGER,
            database_path: None,
            asset_dir: None,
            max_notifications: DEFAULT_MAX_NOTIFICATIONS,
        }
    }
}

impl EditorConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosave_quiet_ms)
    }
}

pub struct ConfigStore {
    config_path: PathBuf,
}

impl ConfigStore {
    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn default_store() -> Result<Self, ConfigError> {
        let project_dirs =
            ProjectDirs::from("app", "noteblock", "Noteblock").ok_or(ConfigError::ProjectDir)?;
        Ok(Self::new(project_dirs.config_dir().join("editor.json")))
    }

    /// Data directory used when the config leaves storage paths unset.
    pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
        let project_dirs =
            ProjectDirs::from("app", "noteblock", "Noteblock").ok_or(ConfigError::ProjectDir)?;
        Ok(project_dirs.data_dir().to_path_buf())
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<EditorConfig, ConfigError> {
        if !self.config_path.exists() {
            return Ok(EditorConfig::default());
        }
        let raw = fs::read_to_string(&self.config_path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, config: &EditorConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(config)?;
        fs::write(&self.config_path, data)?;
        Ok(())
    }
}
