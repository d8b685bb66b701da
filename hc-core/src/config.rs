//! Daemon Settings
//!
//! Persistent daemon configuration stored as JSON in /etc/hyperclock/daemon.json.
//! Every field carries a serde default so a partial (or absent) file still
//! yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use hc_error::{ClockError, Result};
use hc_protocol::PerformanceState;

use crate::constants::{defaults, paths};

fn default_socket_path() -> String {
    paths::SOCKET_PATH.to_string()
}

fn default_thermal_limit() -> u32 {
    defaults::THERMAL_LIMIT_C
}

fn default_power_limit() -> u32 {
    defaults::POWER_LIMIT_W
}

fn default_turbo() -> bool {
    defaults::TURBO_ENABLED
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Unix socket the daemon listens on
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Performance state applied at daemon startup
    #[serde(default)]
    pub default_state: PerformanceState,

    /// Global thermal limit handed to the engine
    #[serde(default = "default_thermal_limit")]
    pub thermal_limit_c: u32,

    /// Global power limit handed to the engine
    #[serde(default = "default_power_limit")]
    pub power_limit_w: u32,

    /// Whether turbo is reported as enabled
    #[serde(default = "default_turbo")]
    pub turbo_boost: bool,

    /// Default tracing filter when HYPERCLOCK_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            default_state: PerformanceState::default(),
            thermal_limit_c: default_thermal_limit(),
            power_limit_w: default_power_limit(),
            turbo_boost: default_turbo(),
            log_filter: default_log_filter(),
        }
    }
}

/// Location of the daemon settings file
pub fn settings_path() -> PathBuf {
    Path::new(paths::CONFIG_DIR).join(paths::CONFIG_FILE)
}

/// Load settings from the default location; a missing file yields defaults
pub fn load_settings() -> Result<DaemonSettings> {
    load_settings_from(&settings_path())
}

/// Load settings from an explicit path; a missing file yields defaults
pub fn load_settings_from(path: &Path) -> Result<DaemonSettings> {
    if !path.exists() {
        debug!("No settings file at {}, using defaults", path.display());
        return Ok(DaemonSettings::default());
    }
    let contents = fs::read_to_string(path)?;
    let settings: DaemonSettings = serde_json::from_str(&contents)?;
    Ok(settings)
}

/// Save settings to the default location
pub fn save_settings(settings: &DaemonSettings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

/// Save settings atomically: write a sibling temp file, then rename over the
/// target so readers never observe a half-written file.
pub fn save_settings_to(settings: &DaemonSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ClockError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|source| ClockError::FileWrite {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| ClockError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("daemon.json")).unwrap();
        assert_eq!(settings, DaemonSettings::default());
        assert_eq!(settings.default_state, PerformanceState::Balanced);
        assert_eq!(settings.thermal_limit_c, 85);
        assert_eq!(settings.power_limit_w, 65);
        assert!(settings.turbo_boost);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("daemon.json");

        let mut settings = DaemonSettings::default();
        settings.default_state = PerformanceState::Performance;
        settings.thermal_limit_c = 95;
        settings.turbo_boost = false;

        save_settings_to(&settings, &path).unwrap();
        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.json");
        fs::write(&path, r#"{"default_state": "extreme"}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.default_state, PerformanceState::Extreme);
        assert_eq!(settings.socket_path, paths::SOCKET_PATH);
        assert_eq!(settings.power_limit_w, 65);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("daemon.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(ClockError::JsonParse(_))
        ));
    }
}
