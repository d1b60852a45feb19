//! Core data types for the flood alert decision pipeline.
//!
//! This module defines the shared domain model imported by all other modules:
//! alert records as written by the edge device, the inputs and outputs of the
//! risk scorer and summary composer, and the error types that cross module
//! boundaries. It contains no pipeline logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::ingest::records::{
    flexible_timestamp, lenient_f64, lenient_string, lenient_string_or_empty,
};

// ---------------------------------------------------------------------------
// Alert records
// ---------------------------------------------------------------------------

/// One hazard observation published by the sensor network.
///
/// Records are read-only to the pipeline. Firmware revisions have written
/// water height and sensor gap under several field names; anything not
/// captured by a typed field is retained in `extra` so the dispatch loop can
/// resolve those aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub sensor: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub level: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub confirmations: Option<f64>,
    #[serde(default, deserialize_with = "flexible_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlertRecord {
    /// Looks up a numeric field by its wire name, typed fields first.
    ///
    /// Numbers and numeric strings both count; non-finite values do not.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        let typed = match field {
            "value" => Some(self.value),
            "distance" => Some(self.distance),
            "humidity" => Some(self.humidity),
            "confirmations" => Some(self.confirmations),
            _ => None,
        };
        match typed {
            Some(v) => v.filter(|x| x.is_finite()),
            None => self
                .extra
                .get(field)
                .and_then(crate::ingest::records::value_as_f64),
        }
    }

    /// Timestamp as epoch milliseconds, if the record carries one.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.timestamp.map(|t| t.timestamp_millis())
    }
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Direction of water-height change between consecutive observations.
///
/// Values that arrive from elsewhere as unrecognized strings are carried
/// through untouched in `Other`; they contribute nothing to the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Trend {
    Stable,
    Rising,
    Falling,
    Other(String),
}

impl Trend {
    pub fn as_str(&self) -> &str {
        match self {
            Trend::Stable => "stable",
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Other(s) => s,
        }
    }
}

impl From<&str> for Trend {
    fn from(s: &str) -> Self {
        match s {
            "stable" => Trend::Stable,
            "rising" => Trend::Rising,
            "falling" => Trend::Falling,
            other => Trend::Other(other.to_string()),
        }
    }
}

impl From<String> for Trend {
    fn from(s: String) -> Self {
        Trend::from(s.as_str())
    }
}

impl From<Trend> for String {
    fn from(t: Trend) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Risk scoring types
// ---------------------------------------------------------------------------

/// Inputs to the risk scorer, derived per dispatched alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskInput {
    pub distance_cm: f64,
    pub rainfall_mm: f64,
    pub humidity: f64,
    pub temp: f64,
    pub trend: Trend,
}

impl RiskInput {
    /// Rejects inputs the scorer must never see: NaN or infinite readings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, v) in [
            ("distance_cm", self.distance_cm),
            ("rainfall_mm", self.rainfall_mm),
            ("humidity", self.humidity),
            ("temp", self.temp),
        ] {
            if !v.is_finite() {
                return Err(ValidationError::NonFinite { field });
            }
        }
        Ok(())
    }
}

/// Coarse three-value flood-danger classification, `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    /// Exact, case-sensitive match against the three allowed strings.
    pub fn parse_exact(s: &str) -> Option<RiskLevel> {
        RiskLevel::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one scoring invocation. Superseded by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskResult {
    pub risk_level: RiskLevel,
    pub explanation: String,
    pub prediction_id: String,
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Compact view of an alert used as summary context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDigest {
    pub sensor: String,
    pub level: String,
    pub value: Option<f64>,
    /// Epoch milliseconds.
    pub timestamp: Option<i64>,
}

impl From<&AlertRecord> for AlertDigest {
    fn from(record: &AlertRecord) -> Self {
        AlertDigest {
            sensor: record.sensor.clone(),
            level: record.level.clone().unwrap_or_default(),
            value: record.value.filter(|v| v.is_finite()),
            timestamp: record.timestamp_millis(),
        }
    }
}

/// Maximum number of alerts carried in a summary request.
pub const MAX_SUMMARY_ALERTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    /// Severity ordinal: 1 info, 2 warning, 3 critical.
    pub current_level: u8,
    pub water_height: f64,
    pub distance: f64,
    pub rainfall: f64,
    /// Newest first.
    pub last_alerts: Vec<AlertDigest>,
}

impl SummaryRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=3).contains(&self.current_level) {
            return Err(ValidationError::Level(self.current_level));
        }
        if self.last_alerts.len() > MAX_SUMMARY_ALERTS {
            return Err(ValidationError::TooManyAlerts(self.last_alerts.len()));
        }
        for (field, v) in [
            ("waterHeight", self.water_height),
            ("distance", self.distance),
            ("rainfall", self.rainfall),
        ] {
            if !v.is_finite() {
                return Err(ValidationError::NonFinite { field });
            }
        }
        Ok(())
    }
}

/// Marker distinguishing remote-AI output from local fallback output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Remote,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Remote => "remote",
            Provenance::Fallback => "fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Provenance> {
        match s {
            "remote" => Some(Provenance::Remote),
            "fallback" => Some(Provenance::Fallback),
            _ => None,
        }
    }
}

/// A summary as shown in the recent-summaries window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub id: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub provenance: Provenance,
}

/// Output of a composer together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed<T> {
    pub output: T,
    pub provenance: Provenance,
    /// Soft, user-facing notice set whenever the fallback path ran.
    pub advisory: Option<String>,
}

// ---------------------------------------------------------------------------
// Weather context
// ---------------------------------------------------------------------------

/// Weather readings as of the provider's last refresh. Every field may be
/// absent; absent readings count as zero when scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherContext {
    pub rain_1h_mm: Option<f64>,
    pub rain_3h_mm: Option<f64>,
    pub humidity: Option<f64>,
    pub temperature_c: Option<f64>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Caller misuse: a request that must be rejected before reaching core logic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("currentLevel must be 1, 2 or 3, got {0}")]
    Level(u8),
    #[error("lastAlerts holds {0} entries, at most 5 allowed")]
    TooManyAlerts(usize),
}

/// Failures of the remote inference path. Every variant is recovered by the
/// local fallback; none reaches the end user as a hard error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// No API key configured or inference switched off.
    #[error("inference disabled: {0}")]
    Disabled(String),
    /// Connection, DNS, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-2xx response from the inference service.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    #[error("empty response from inference service")]
    EmptyResponse,
    /// The body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
    /// The body decoded but violates the expected output contract.
    #[error("schema error: {0}")]
    Schema(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => InferenceError::HttpStatus(status.as_u16()),
            None if err.is_decode() => InferenceError::Parse(err.to_string()),
            None => InferenceError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        InferenceError::Parse(err.to_string())
    }
}
