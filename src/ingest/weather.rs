//! Weather context for risk scoring.
//!
//! The dashboard refreshes current conditions from an OpenWeather-style
//! provider (metric units) and hands the last payload it received to the
//! pipeline. This module only decodes that payload; fetching it is the
//! caller's business.
//!
//! Payload fields used:
//! - `main.temp`      air temperature, °C
//! - `main.humidity`  relative humidity, %
//! - `rain.1h`        precipitation over the last hour, mm
//! - `rain.3h`        precipitation over the last three hours, mm

use serde::Deserialize;
use serde_json::Value;

use crate::model::WeatherContext;

// ============================================================================
// Provider Response Structures
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct CurrentConditions {
    #[serde(default)]
    main: Option<MainBlock>,
    #[serde(default)]
    rain: Option<RainBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RainBlock {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
    #[serde(rename = "3h")]
    three_hour: Option<f64>,
}

// ============================================================================
// Decoding
// ============================================================================

impl WeatherContext {
    /// Builds a context from a current-conditions payload.
    ///
    /// A payload that does not match the expected shape yields an empty
    /// context; absent weather is valid input to the scorer.
    pub fn from_openweather(payload: &Value) -> WeatherContext {
        let parsed = CurrentConditions::deserialize(payload).unwrap_or_default();
        let main = parsed.main.unwrap_or_default();
        let rain = parsed.rain.unwrap_or_default();

        WeatherContext {
            rain_1h_mm: finite(rain.one_hour),
            rain_3h_mm: finite(rain.three_hour),
            humidity: finite(main.humidity),
            temperature_c: finite(main.temp),
        }
    }

    /// Rainfall used for scoring and summaries: the last hour, else zero.
    pub fn rainfall_mm(&self) -> f64 {
        self.rain_1h_mm.unwrap_or(0.0)
    }

    pub fn temperature_or_zero(&self) -> f64 {
        self.temperature_c.unwrap_or(0.0)
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

// ============================================================================
// Tests
// ============================================================================
