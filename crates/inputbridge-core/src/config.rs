//! Configuration
//!
//! TOML configuration for the translation core. Every section and field has
//! a default, so an empty file (or no file at all) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pointer grab, clipping and raw motion
    pub pointer: PointerConfig,

    /// Focus handling
    pub focus: FocusConfig,

    /// Window state synchronization
    pub window: WindowConfig,
}

/// Pointer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerConfig {
    /// Allow exclusive pointer grabs at all
    pub grab_pointer: bool,

    /// Clip to the primary monitor of a multi-monitor desktop when a
    /// fullscreen window is active
    pub grab_fullscreen: bool,

    /// Applications only consume raw input; motion and raw events are never
    /// merged
    pub raw_input_only: bool,

    /// Minimum time between a clip reset and the next automatic fullscreen
    /// clip
    pub clip_reset_debounce_ms: u64,

    /// Cursor is re-synced at least this often while the pointer moves over
    /// the same window
    pub cursor_sync_interval_ms: u64,

    /// The host delivers raw events that ignore pointer warps
    pub broken_raw_events: bool,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            grab_pointer: true,
            grab_fullscreen: false,
            raw_input_only: false,
            clip_reset_debounce_ms: 1000,
            cursor_sync_interval_ms: 100,
            broken_raw_events: false,
        }
    }
}

/// Focus settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// The window manager uses `WM_TAKE_FOCUS`; focus-in does not activate
    pub use_take_focus: bool,

    /// Wait for the foreground window to reapply its clip
    pub clip_request_timeout_ms: u64,

    /// Wait for cross-thread queries such as the clip owner lookup
    pub probe_timeout_ms: u64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            use_take_focus: true,
            clip_request_timeout_ms: 500,
            probe_timeout_ms: 500,
        }
    }
}

/// Window state settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Upper bound for waiting on a withdrawn-state acknowledgement
    pub wait_withdrawn_timeout_ms: u64,

    /// Guest runs inside a single virtual desktop window
    pub virtual_desktop: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            wait_withdrawn_timeout_ms: 2000,
            virtual_desktop: false,
        }
    }
}

/// Values that parse but cannot work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("grab_fullscreen requires grab_pointer")]
    FullscreenWithoutGrab,
}

impl Config {
    /// Load configuration from `path`, or from the first file found in the
    /// standard locations.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).or_else(Self::find_config_file);

        match config_path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {:?}", path);
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {path:?}"))?;
                let config = Self::from_toml(&content)
                    .with_context(|| format!("Failed to parse config file: {path:?}"))?;
                Ok(config)
            }
            Some(path) => {
                warn!("Config file not found at {:?}, using defaults", path);
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the configuration file
    fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            dirs::config_dir().map(|p| p.join("inputbridge/config.toml")),
            dirs::home_dir().map(|p| p.join(".inputbridge/config.toml")),
            Some(PathBuf::from("/etc/inputbridge/config.toml")),
        ];

        candidates.into_iter().flatten().find(|p| p.exists())
    }

    /// Generate default configuration as a string
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.focus.clip_request_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("focus.clip_request_timeout_ms"));
        }
        if self.focus.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("focus.probe_timeout_ms"));
        }
        if self.window.wait_withdrawn_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout("window.wait_withdrawn_timeout_ms"));
        }
        if self.pointer.grab_fullscreen && !self.pointer.grab_pointer {
            return Err(ConfigError::FullscreenWithoutGrab);
        }
        Ok(())
    }
}

impl FocusConfig {
    pub const fn clip_request_timeout(&self) -> Duration {
        Duration::from_millis(self.clip_request_timeout_ms)
    }

    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.pointer.grab_pointer);
        assert_eq!(config.pointer.clip_reset_debounce_ms, 1000);
        assert_eq!(config.window.wait_withdrawn_timeout_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = Config::default_config_string();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed = Config::from_toml("[pointer]\ngrab_fullscreen = true\n").unwrap();
        assert!(parsed.pointer.grab_fullscreen);
        assert_eq!(parsed.pointer.cursor_sync_interval_ms, 100);
        assert!(parsed.focus.use_take_focus);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_toml("[focus]\nprobe_timeout_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("probe_timeout_ms"));
        assert!(Config::from_toml("[pointer]\ngrab_pointer = false\ngrab_fullscreen = true\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[window]\nvirtual_desktop = true").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.window.virtual_desktop);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pointer\ngrab_pointer = ").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
