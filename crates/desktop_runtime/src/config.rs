//! Shell configuration.
//!
//! Every field has a default, so an empty TOML document (or none at all) yields a working
//! shell. [`ShellConfig::validate`] checks semantic rules after deserialization.

use std::{fs, path::Path};

use platform_host::DAY_MS;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    event_bus::DEFAULT_EVENT_LOG_CAPACITY,
    model::{WindowRect, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH, WINDOW_HEADER_HEIGHT},
    store::{StoreSettings, DEFAULT_PERSIST_DEBOUNCE_MS, DEFAULT_STORAGE_KEY},
    window_manager::{WindowManagerSettings, DEFAULT_CLOSE_DELAY_MS, DEFAULT_INITIAL_Z_INDEX},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse shell config: {0}")]
    Parse(String),
    #[error("invalid shell config:\n- {}", .0.join("\n- "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub event_log_capacity: usize,
    pub close_animation_ms: u64,
    pub auto_persist: bool,
    pub persist_debounce_ms: u64,
    pub storage_key: String,
    pub max_persisted_age_days: u64,
    pub min_window_width: i32,
    pub min_window_height: i32,
    pub initial_z_index: u32,
    pub header_height: i32,
    pub viewport: WindowRect,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            close_animation_ms: DEFAULT_CLOSE_DELAY_MS,
            auto_persist: true,
            persist_debounce_ms: DEFAULT_PERSIST_DEBOUNCE_MS,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            max_persisted_age_days: 30,
            min_window_width: MIN_WINDOW_WIDTH,
            min_window_height: MIN_WINDOW_HEIGHT,
            initial_z_index: DEFAULT_INITIAL_Z_INDEX,
            header_height: WINDOW_HEADER_HEIGHT,
            viewport: WindowRect::new(0, 0, 1280, 720),
        }
    }
}

impl ShellConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and [`ConfigError::Invalid`] when a
    /// rule is violated.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise as
    /// [`ShellConfig::from_toml_str`].
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let body = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&body)
    }

    /// Checks every rule and reports all violations together.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] listing each violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.event_log_capacity == 0 {
            errors.push("event_log_capacity must be at least 1".to_string());
        }
        if self.storage_key.trim().is_empty() {
            errors.push("storage_key must not be empty".to_string());
        }
        if self.min_window_width <= 0 || self.min_window_height <= 0 {
            errors.push("minimum window size must be positive".to_string());
        }
        if self.viewport.w <= 0 || self.viewport.h <= 0 {
            errors.push("viewport size must be positive".to_string());
        }
        if self.header_height < 0 {
            errors.push("header_height must not be negative".to_string());
        }
        if self.max_persisted_age_days == 0 {
            errors.push("max_persisted_age_days must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn window_settings(&self) -> WindowManagerSettings {
        WindowManagerSettings {
            min_width: self.min_window_width,
            min_height: self.min_window_height,
            initial_z_index: self.initial_z_index,
            close_delay_ms: self.close_animation_ms,
            viewport: self.viewport,
        }
    }

    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            storage_key: self.storage_key.clone(),
            max_age_ms: self.max_persisted_age_days.saturating_mul(DAY_MS),
        }
    }
}
