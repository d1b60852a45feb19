//! Water-height trend detection.
//!
//! Ultrasonic readings jitter by a few millimetres between samples, so a
//! change only counts as movement once it leaves a ±0.5 cm deadband around
//! the previous reading.

use crate::model::Trend;

/// Half-width of the no-change band, in the same unit as the readings (cm).
pub const TREND_DEADBAND: f64 = 0.5;

/// Classifies `current` against the previously observed height.
///
/// Without a previous reading there is nothing to compare, so the trend is
/// `Stable`.
pub fn classify_trend(previous: Option<f64>, current: f64) -> Trend {
    let Some(previous) = previous else {
        return Trend::Stable;
    };
    if current > previous + TREND_DEADBAND {
        Trend::Rising
    } else if current < previous - TREND_DEADBAND {
        Trend::Falling
    } else {
        Trend::Stable
    }
}

/// Last observed water height, process lifetime.
#[derive(Debug, Clone, Default)]
pub struct TrendTracker {
    previous: Option<f64>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<f64> {
        self.previous
    }

    /// Classifies `current` and stores it as the new previous height.
    ///
    /// Call exactly once per dispatched alert.
    pub fn observe(&mut self, current: f64) -> Trend {
        let trend = classify_trend(self.previous, current);
        self.previous = Some(current);
        trend
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
