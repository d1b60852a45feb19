//! Service configuration.
//!
//! Settings are read from a TOML file (`floodwatch.toml` by default) and then
//! overridden from the environment. A `.env` file in the working directory is
//! loaded first, so secrets such as the inference API key never need to live
//! in the TOML file.
//!
//! Every section is optional; a missing section or key takes its default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::thresholds::WaterLevelThresholds;
use crate::logging::{self, Component, LogLevel};
use crate::model::MAX_SUMMARY_ALERTS;

pub const DEFAULT_CONFIG_PATH: &str = "./floodwatch.toml";

/// Upper bound on summaries shown at once.
pub const MAX_VISIBLE_SUMMARIES: usize = 20;

// ---------------------------------------------------------------------------
// Configuration sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub inference: InferenceConfig,
    pub dispatch: DispatchConfig,
    pub thresholds: WaterLevelThresholds,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
}

/// Remote inference gateway settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub risk_temperature: f32,
    pub summary_temperature: f32,
    /// Resolved from `api_key_env`; never read from or written to the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 20,
            risk_temperature: 0.2,
            summary_temperature: 0.35,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of most recent alerts handed to the summary composer.
    pub summary_alert_window: usize,
    /// Number of summaries kept in the visible window.
    pub visible_summary_limit: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            summary_alert_window: MAX_SUMMARY_ALERTS,
            visible_summary_limit: MAX_VISIBLE_SUMMARIES,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Append-only log file; console only when absent.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    /// Seconds between alert snapshots.
    pub poll_interval_secs: u64,
    /// Number of most recent alert documents read per snapshot.
    pub snapshot_size: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            poll_interval_secs: 15,
            snapshot_size: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses configuration from TOML text, without environment overrides.
pub fn parse_config(text: &str) -> Result<ServiceConfig, toml::de::Error> {
    let mut config: ServiceConfig = toml::from_str(text)?;
    config.normalize();
    Ok(config)
}

/// Loads the file at `path` and applies environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    let mut config = parse_config(&text).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })?;
    config.apply_env_overrides();
    Ok(config)
}

/// Like [`load_config`], but a missing file means defaults plus environment.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return load_config(path);
    }
    logging::warn(
        Component::System,
        None,
        &format!("config file {} not found, using defaults", path.display()),
    );
    let mut config = ServiceConfig::default();
    config.apply_env_overrides();
    Ok(config)
}

impl ServiceConfig {
    /// Loads `.env` and applies process environment overrides.
    pub fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides using `lookup` to resolve variable names.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FLOODWATCH_INFERENCE_ENABLED") {
            match parse_flag(&v) {
                Some(flag) => self.inference.enabled = flag,
                None => logging::warn(
                    Component::System,
                    None,
                    &format!("ignoring FLOODWATCH_INFERENCE_ENABLED={:?}", v),
                ),
            }
        }
        if let Some(v) = lookup("FLOODWATCH_INFERENCE_ENDPOINT") {
            self.inference.endpoint = v;
        }
        if let Some(v) = lookup("FLOODWATCH_MODEL") {
            self.inference.model = v;
        }
        if let Some(v) = lookup("FLOODWATCH_LOG_LEVEL") {
            match LogLevel::parse(&v) {
                Some(level) => self.logging.level = level,
                None => logging::warn(
                    Component::System,
                    None,
                    &format!("ignoring FLOODWATCH_LOG_LEVEL={:?}", v),
                ),
            }
        }
        if let Some(v) = lookup("FLOODWATCH_LOG_FILE") {
            self.logging.file = Some(v);
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        self.inference.api_key = lookup(&self.inference.api_key_env).filter(|k| !k.trim().is_empty());
        self.normalize();
    }

    /// Clamps values that have hard upper bounds in the pipeline.
    fn normalize(&mut self) {
        self.dispatch.summary_alert_window = self
            .dispatch
            .summary_alert_window
            .clamp(1, MAX_SUMMARY_ALERTS);
        self.dispatch.visible_summary_limit = self
            .dispatch
            .visible_summary_limit
            .clamp(1, MAX_VISIBLE_SUMMARIES);
        self.inference.timeout_secs = self.inference.timeout_secs.max(1);
        self.store.poll_interval_secs = self.store.poll_interval_secs.max(1);
        self.store.snapshot_size = self.store.snapshot_size.max(1);
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
