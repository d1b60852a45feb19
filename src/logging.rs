//! Structured logging for the flood alert pipeline.
//!
//! Thin facade over `tracing`: every event is tagged with the pipeline
//! component that produced it and, where one exists, the alert key being
//! processed. `init_logger` installs a `tracing-subscriber` formatter writing
//! to the console or to an append-only log file for daemon operation.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::model::InferenceError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Dispatch,
    Scorer,
    Summary,
    Gateway,
    Store,
    Weather,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Dispatch => write!(f, "DISPATCH"),
            Component::Scorer => write!(f, "SCORER"),
            Component::Summary => write!(f, "SUMMARY"),
            Component::Gateway => write!(f, "GATEWAY"),
            Component::Store => write!(f, "STORE"),
            Component::Weather => write!(f, "WEATHER"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - inference switched off or no API key configured
    Expected,
    /// Unexpected failure - service unreachable or returning errors
    Unexpected,
    /// Unknown - the service answered but the output was unusable
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a remote inference failure
pub fn classify_inference_failure(err: &InferenceError) -> FailureType {
    match err {
        InferenceError::Disabled(_) => FailureType::Expected,
        InferenceError::Transport(_) | InferenceError::HttpStatus(_) => FailureType::Unexpected,
        InferenceError::EmptyResponse | InferenceError::Parse(_) | InferenceError::Schema(_) => {
            FailureType::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `min_level` when set. Calling this more
/// than once returns an error from the second call and leaves the first
/// subscriber in place.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.directive()));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()?;
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, alert_key: Option<&str>, message: &str) {
    tracing::info!(component = %component, alert = alert_key.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(component: Component, alert_key: Option<&str>, message: &str) {
    tracing::warn!(component = %component, alert = alert_key.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(component: Component, alert_key: Option<&str>, message: &str) {
    tracing::error!(component = %component, alert = alert_key.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(component: Component, alert_key: Option<&str>, message: &str) {
    tracing::debug!(component = %component, alert = alert_key.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a remote inference failure with automatic classification
pub fn log_inference_failure(
    component: Component,
    alert_key: Option<&str>,
    operation: &str,
    err: &InferenceError,
) {
    let failure_type = classify_inference_failure(err);
    let message = format!(
        "{} failed [{}]: {}; using local fallback",
        operation, failure_type, err
    );

    match failure_type {
        FailureType::Expected => debug(component, alert_key, &message),
        FailureType::Unexpected => error(component, alert_key, &message),
        FailureType::Unknown => warn(component, alert_key, &message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parse_accepts_common_spellings() {
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse(" warning "), Some(LogLevel::Warning));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("loud"), None);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            classify_inference_failure(&InferenceError::Disabled("no key".into())),
            FailureType::Expected
        );
        assert_eq!(
            classify_inference_failure(&InferenceError::HttpStatus(503)),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_inference_failure(&InferenceError::Transport("timed out".into())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_inference_failure(&InferenceError::Schema("riskLevel \"Severe\"".into())),
            FailureType::Unknown
        );
    }
}
