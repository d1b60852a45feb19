//! Natural-language situation summaries.
//!
//! The remote model is asked for a bold one-line headline followed by a short
//! list of recommended actions. When it cannot answer, a fixed markdown
//! template is filled in locally:
//!
//! ```text
//! **<headline>**
//!
//! - Water height: 16.4 cm (sensor gap 3.6 cm)
//! - Rainfall last hour: 7.5 mm
//! - Recent alerts:
//!   - flood (critical) · 16.4 at 14:02:11
//! _<local estimate footer>_
//! ```
//!
//! Composition is a pure projection of the request; nothing is mutated.

use std::fmt::{Display, Write};

use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};

use crate::alert::thresholds::AlertSeverity;
use crate::inference::{TextGenerationClient, remote_or_fallback, strip_code_fence};
use crate::logging::Component;
use crate::model::{AlertDigest, Composed, InferenceError, SummaryRequest, ValidationError};

/// Alerts listed by the local template.
pub const FALLBACK_ALERT_LIMIT: usize = 3;

pub const LOCAL_ESTIMATE_FOOTER: &str =
    "_Local estimate generated without the AI assistant; check readings on site._";

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Renders a reading with at most two decimals and no trailing zeros.
pub fn format_reading(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn format_value(value: Option<f64>) -> String {
    value.map(format_reading).unwrap_or_else(|| "n/a".to_string())
}

fn iso_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "unknown time".to_string())
}

fn local_time<Tz>(millis: Option<i64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    millis
        .and_then(|ms| tz.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown time".to_string())
}

fn headline_for(level: u8) -> &'static str {
    AlertSeverity::from_ordinal(level)
        .unwrap_or(AlertSeverity::Info)
        .headline()
}

// ---------------------------------------------------------------------------
// Remote strategy
// ---------------------------------------------------------------------------

fn render_alert_line(alert: &AlertDigest) -> String {
    format!(
        "{} ({}) → {} at {}",
        alert.sensor,
        alert.level,
        format_value(alert.value),
        iso_timestamp(alert.timestamp)
    )
}

pub fn summary_prompt(req: &SummaryRequest) -> String {
    let alerts = if req.last_alerts.is_empty() {
        "- none".to_string()
    } else {
        req.last_alerts
            .iter()
            .map(|a| format!("- {}", render_alert_line(a)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are a flood-safety assistant writing for residents near a monitored river.\n\
         Write a situation summary as plain markdown with no extra commentary:\n\
         one bold headline line, then a short bullet list of recommended actions.\n\n\
         Current severity level (1 = info, 2 = warning, 3 = critical): {}\n\
         Water height: {} cm\n\
         Sensor gap (distance): {} cm\n\
         Rainfall last hour: {} mm\n\
         Recent alerts, newest first:\n{}",
        req.current_level,
        format_reading(req.water_height),
        format_reading(req.distance),
        format_reading(req.rainfall),
        alerts
    )
}

/// Accepts any non-empty markdown reply, minus optional code fences.
pub fn parse_remote_summary(text: &str) -> Result<String, InferenceError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(body.to_string())
}

// ---------------------------------------------------------------------------
// Local template
// ---------------------------------------------------------------------------

/// Fills the local template, rendering alert times in `tz`.
pub fn fallback_summary_in<Tz>(req: &SummaryRequest, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "**{}**", headline_for(req.current_level));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- Water height: {} cm (sensor gap {} cm)",
        format_reading(req.water_height),
        format_reading(req.distance)
    );
    let _ = writeln!(out, "- Rainfall last hour: {} mm", format_reading(req.rainfall));
    let _ = writeln!(out, "- Recent alerts:");
    if req.last_alerts.is_empty() {
        let _ = writeln!(out, "  - none recorded");
    }
    for alert in req.last_alerts.iter().take(FALLBACK_ALERT_LIMIT) {
        let _ = writeln!(
            out,
            "  - {} ({}) · {} at {}",
            alert.sensor,
            alert.level,
            format_value(alert.value),
            local_time(alert.timestamp, tz)
        );
    }
    out.push_str(LOCAL_ESTIMATE_FOOTER);
    out
}

/// Local template with alert times in the host's timezone.
pub fn fallback_summary(req: &SummaryRequest) -> String {
    fallback_summary_in(req, &Local)
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

pub fn compose_summary<C>(client: &C, req: &SummaryRequest, temperature: f32) -> Composed<String>
where
    C: TextGenerationClient + ?Sized,
{
    remote_or_fallback(
        client,
        Component::Summary,
        &summary_prompt(req),
        temperature,
        parse_remote_summary,
        || fallback_summary(req),
    )
}

/// Boundary entry point: rejects malformed requests before composing.
pub fn compose_summary_checked<C>(
    client: &C,
    req: &SummaryRequest,
    temperature: f32,
) -> Result<Composed<String>, ValidationError>
where
    C: TextGenerationClient + ?Sized,
{
    req.validate()?;
    Ok(compose_summary(client, req, temperature))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
