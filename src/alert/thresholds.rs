//! Alert severity grading.
//!
//! Two sources of severity exist. Normally the edge device tags each alert
//! with a level ("low" / "medium" / "critical", older firmware used
//! "info" / "warning" / "critical"). Records without a tag are graded from
//! their water height with the same thresholds the device uses.

use serde::{Deserialize, Serialize};

/// Severity ordinal used by the summary composer, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Maps a severity tag, case-insensitively. Unrecognized tags are treated
    /// as informational.
    pub fn from_tag(tag: &str) -> AlertSeverity {
        match tag.trim().to_ascii_lowercase().as_str() {
            "critical" | "high" | "severe" => AlertSeverity::Critical,
            "warning" | "warn" | "medium" | "moderate" => AlertSeverity::Warning,
            _ => AlertSeverity::Info,
        }
    }

    /// Grades a record: its tag when present, otherwise its water height.
    pub fn for_record(
        tag: Option<&str>,
        water_height_cm: f64,
        thresholds: &WaterLevelThresholds,
    ) -> AlertSeverity {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => AlertSeverity::from_tag(tag),
            None => match thresholds.classify(water_height_cm) {
                Some(WaterLevel::Critical) => AlertSeverity::Critical,
                Some(WaterLevel::Medium) => AlertSeverity::Warning,
                Some(WaterLevel::Low) | None => AlertSeverity::Info,
            },
        }
    }

    pub fn ordinal(self) -> u8 {
        match self {
            AlertSeverity::Info => 1,
            AlertSeverity::Warning => 2,
            AlertSeverity::Critical => 3,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<AlertSeverity> {
        match ordinal {
            1 => Some(AlertSeverity::Info),
            2 => Some(AlertSeverity::Warning),
            3 => Some(AlertSeverity::Critical),
            _ => None,
        }
    }

    /// Headline for the local summary: monitor, prepare, act now.
    pub fn headline(self) -> &'static str {
        match self {
            AlertSeverity::Info => "Conditions stable: keep monitoring",
            AlertSeverity::Warning => "Moderate flood risk: prepare to act",
            AlertSeverity::Critical => "Critical flood risk: act now",
        }
    }
}

// ---------------------------------------------------------------------------
// Water level thresholds
// ---------------------------------------------------------------------------

/// Water level bands reported by the edge device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterLevel {
    Low,
    Medium,
    Critical,
}

/// Water height thresholds in centimetres, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterLevelThresholds {
    pub low_cm: f64,
    pub medium_cm: f64,
    pub critical_cm: f64,
}

impl Default for WaterLevelThresholds {
    fn default() -> Self {
        Self {
            low_cm: 13.0,
            medium_cm: 15.0,
            critical_cm: 18.0,
        }
    }
}

impl WaterLevelThresholds {
    /// Returns the band `water_height_cm` falls in, or `None` below `low_cm`.
    pub fn classify(&self, water_height_cm: f64) -> Option<WaterLevel> {
        if water_height_cm >= self.critical_cm {
            Some(WaterLevel::Critical)
        } else if water_height_cm >= self.medium_cm {
            Some(WaterLevel::Medium)
        } else if water_height_cm >= self.low_cm {
            Some(WaterLevel::Low)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
