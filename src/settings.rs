use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, SettingsError};

const DEFAULT_EXPORT_DIR: &str = "~/Documents/Agreements";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// JSON file with agreements. The embedded sample set is used when unset.
    #[serde(default)]
    pub data_file: Option<String>,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

fn default_export_dir() -> String {
    DEFAULT_EXPORT_DIR.to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self { data_file: None, export_dir: default_export_dir() }
    }
}

impl AppSettings {
    pub fn data_path(&self) -> Option<PathBuf> {
        self.data_file.as_deref().map(|p| PathBuf::from(expand_home_dir(p)))
    }

    pub fn export_path(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.export_dir))
    }

    /// Missing file means defaults; a broken one is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`AppSettings::load_from`], but a broken file is reported and replaced by defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load_from(path).unwrap_or_else(|e| {
            warn!("Ignoring unreadable settings at {} ({e}); saving will overwrite it", path.display());
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "agreement-viewer", "app") {
        return proj_dirs.config_dir().join("settings.toml");
    }
    warn!("No platform config directory, using ./settings.toml");
    PathBuf::from("settings.toml")
}

pub fn load_settings() -> Result<AppSettings, SettingsError> {
    AppSettings::load_from(&get_config_path())
}

pub fn setup_config_wizard() -> Result<AppSettings, AppError> {
    println!("\n--- Configuration Setup ---");
    let current = AppSettings::load_or_default(&get_config_path());

    let data_default = current.data_file.clone().unwrap_or_default();
    let data_input = Text::new("Agreement data file (JSON, leave empty for the built-in sample):")
        .with_default(&data_default)
        .prompt()?;
    let data_file = if data_input.trim().is_empty() { None } else { Some(data_input.trim().to_string()) };

    let export_dir = Text::new("Export directory:").with_default(&current.export_dir).prompt()?;

    let settings = AppSettings { data_file, export_dir };
    let path = get_config_path();
    settings.save_to(&path)?;
    println!("Settings saved to {}", path.display());
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("agreement-viewer-settings-{}", std::process::id()));
        let path = dir.join("settings.toml");

        assert_eq!(AppSettings::load_from(&path).unwrap(), AppSettings::default());

        let settings = AppSettings {
            data_file: Some("/tmp/agreements.json".into()),
            export_dir: "/tmp/exports".into(),
        };
        settings.save_to(&path).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), settings);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_broken_settings_fall_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("agreement-viewer-broken-{}", std::process::id()));
        let path = dir.join("settings.toml");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, "export_dir = [unterminated").unwrap();

        assert!(matches!(AppSettings::load_from(&path), Err(SettingsError::Parse(_))));
        assert_eq!(AppSettings::load_or_default(&path), AppSettings::default());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: AppSettings = toml::from_str(r#"data_file = "a.json""#).unwrap();
        assert_eq!(settings.export_dir, DEFAULT_EXPORT_DIR);
        assert_eq!(settings.data_path(), Some(PathBuf::from("a.json")));
    }

    #[test]
    fn test_expand_home_dir_leaves_plain_paths() {
        assert_eq!(expand_home_dir("/var/data"), "/var/data");
        assert!(!expand_home_dir("~/x").starts_with('~') || BaseDirs::new().is_none());
    }
}
