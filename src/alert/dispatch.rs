//! Alert dedup / dispatch loop.
//!
//! Every store snapshot is a full batch, not a delta. Per batch the loop
//! picks the single most relevant alert, skips it if its key was seen before,
//! and otherwise runs trend, risk scoring and summarization for it exactly
//! once. Handling one candidate per batch bounds inference calls when sensors
//! fire in bursts.
//!
//! The key is marked processed before any remote call starts, and regardless
//! of whether scoring succeeds, so a failing alert can never be retried on
//! every refresh.

use std::collections::HashSet;

use chrono::Utc;

use crate::alert::feed::SummaryFeed;
use crate::alert::summary::compose_summary;
use crate::alert::thresholds::{AlertSeverity, WaterLevelThresholds};
use crate::analysis::risk::score_risk;
use crate::analysis::trend::TrendTracker;
use crate::config::ServiceConfig;
use crate::inference::{TextGenerationClient, client_from_config};
use crate::logging::{self, Component};
use crate::model::{
    AlertDigest, AlertRecord, Composed, MAX_SUMMARY_ALERTS, Provenance, RiskInput, RiskResult,
    SummaryDocument, SummaryRequest, Trend, WeatherContext,
};
use crate::store::{PipelineSink, SummaryEnvelope};

/// Field names that have carried the water height, in precedence order.
pub const HEIGHT_FIELDS: &[&str] = &["value", "waterHeight", "height_cm", "water_level_cm"];

/// Field names that have carried the sensor-to-water gap, in precedence order.
pub const DISTANCE_FIELDS: &[&str] = &["distance", "distance_cm", "sensor_gap_cm"];

// ---------------------------------------------------------------------------
// Candidate selection
// ---------------------------------------------------------------------------

/// Rules for picking the alert to act on, evaluated in [`CandidateRule::PRECEDENCE`]
/// order against a newest-first batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateRule {
    /// Sensor tag contains "flood", case-insensitively.
    FloodSensor,
    /// Carries both a numeric value and a numeric distance.
    ValueAndDistance,
    /// Anything at all.
    FirstRecord,
}

impl CandidateRule {
    pub const PRECEDENCE: [CandidateRule; 3] = [
        CandidateRule::FloodSensor,
        CandidateRule::ValueAndDistance,
        CandidateRule::FirstRecord,
    ];

    pub fn matches(self, record: &AlertRecord) -> bool {
        match self {
            CandidateRule::FloodSensor => record.sensor.to_ascii_lowercase().contains("flood"),
            CandidateRule::ValueAndDistance => {
                record.numeric("value").is_some() && record.numeric("distance").is_some()
            }
            CandidateRule::FirstRecord => true,
        }
    }
}

/// Orders a batch newest first. Records without a timestamp go last; ties
/// keep delivery order.
pub fn order_newest_first(batch: &[AlertRecord]) -> Vec<&AlertRecord> {
    let mut ordered: Vec<&AlertRecord> = batch.iter().collect();
    ordered.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ordered
}

/// First record matching the highest-precedence rule that matches anything.
pub fn select_candidate<'a>(ordered: &[&'a AlertRecord]) -> Option<(CandidateRule, &'a AlertRecord)> {
    CandidateRule::PRECEDENCE.into_iter().find_map(|rule| {
        ordered
            .iter()
            .find(|r| rule.matches(r))
            .map(|r| (rule, *r))
    })
}

/// Stable identity of a record: its id, or sensor plus timestamp.
pub fn alert_key(record: &AlertRecord) -> String {
    match record.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => match record.timestamp_millis() {
            Some(ms) => format!("{}:{}", record.sensor, ms),
            None => format!("{}:unknown", record.sensor),
        },
    }
}

/// First finite numeric among `fields`, in order.
pub fn first_numeric(record: &AlertRecord, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|f| record.numeric(f))
}

// ---------------------------------------------------------------------------
// Dispatch state
// ---------------------------------------------------------------------------

/// State owned by the dispatch loop: keys already handled and the trend
/// reference height. Nothing else writes to it.
#[derive(Debug, Clone, Default)]
pub struct DispatchContext {
    processed: HashSet<String>,
    trend: TrendTracker,
}

impl DispatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed.contains(key)
    }

    /// Records `key`; returns `false` if it was already present.
    pub fn mark_processed(&mut self, key: &str) -> bool {
        self.processed.insert(key.to_string())
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn previous_height(&self) -> Option<f64> {
        self.trend.previous()
    }

    fn observe_height(&mut self, height: f64) -> Trend {
        self.trend.observe(height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub risk_temperature: f32,
    pub summary_temperature: f32,
    pub summary_alert_window: usize,
    pub thresholds: WaterLevelThresholds,
    pub visible_summary_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for DispatchSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            risk_temperature: config.inference.risk_temperature,
            summary_temperature: config.inference.summary_temperature,
            summary_alert_window: config.dispatch.summary_alert_window.clamp(1, MAX_SUMMARY_ALERTS),
            thresholds: config.thresholds.clone(),
            visible_summary_limit: config.dispatch.visible_summary_limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingWaterHeight,
    MissingDistance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The batch held no records.
    Empty,
    /// The candidate was handled by an earlier batch.
    AlreadyProcessed { key: String },
    /// The candidate lacks the readings needed for scoring; it is marked
    /// processed and will not be looked at again.
    Skipped { key: String, reason: SkipReason },
    Dispatched(Box<DispatchReport>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub key: String,
    pub rule: CandidateRule,
    pub trend: Trend,
    pub risk_input: RiskInput,
    pub risk: Composed<RiskResult>,
    pub summary_request: SummaryRequest,
    pub summary: Composed<String>,
    /// Whether a provisional entry was added to the summary feed.
    pub provisional_added: bool,
    /// Sink failures; logged, never fatal.
    pub sink_errors: Vec<String>,
}

impl DispatchReport {
    /// Soft advisory to show, if either composer fell back.
    pub fn advisory(&self) -> Option<&str> {
        self.risk
            .advisory
            .as_deref()
            .or(self.summary.advisory.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct AlertDispatcher<C, S> {
    client: C,
    sink: S,
    settings: DispatchSettings,
    context: DispatchContext,
    feed: SummaryFeed,
    latest_risk: Option<Composed<RiskResult>>,
}

impl<S: PipelineSink> AlertDispatcher<Box<dyn TextGenerationClient>, S> {
    /// Dispatcher wired to the configured inference client.
    pub fn from_config(config: &ServiceConfig, sink: S) -> Self {
        AlertDispatcher::new(
            client_from_config(&config.inference),
            sink,
            DispatchSettings::from(config),
        )
    }
}

impl<C, S> AlertDispatcher<C, S>
where
    C: TextGenerationClient,
    S: PipelineSink,
{
    pub fn new(client: C, sink: S, settings: DispatchSettings) -> Self {
        let feed = SummaryFeed::new(settings.visible_summary_limit);
        Self {
            client,
            sink,
            settings,
            context: DispatchContext::new(),
            feed,
            latest_risk: None,
        }
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn latest_risk(&self) -> Option<&Composed<RiskResult>> {
        self.latest_risk.as_ref()
    }

    pub fn visible_summaries(&self) -> Vec<SummaryDocument> {
        self.feed.visible()
    }

    /// Feeds the store's latest summary snapshot into the visible window.
    pub fn sync_summaries(&mut self, snapshot: Vec<SummaryDocument>) {
        self.feed.sync_persisted(snapshot);
    }

    /// Handles one batch snapshot. At most one alert is dispatched.
    pub fn on_batch(&mut self, batch: &[AlertRecord], weather: &WeatherContext) -> DispatchOutcome {
        let ordered = order_newest_first(batch);
        let Some((rule, candidate)) = select_candidate(&ordered) else {
            logging::debug(Component::Dispatch, None, "empty batch, nothing to dispatch");
            return DispatchOutcome::Empty;
        };

        let key = alert_key(candidate);
        if !self.context.mark_processed(&key) {
            logging::debug(Component::Dispatch, Some(&key), "already processed, skipping");
            return DispatchOutcome::AlreadyProcessed { key };
        }

        let height = first_numeric(candidate, HEIGHT_FIELDS);
        let distance = first_numeric(candidate, DISTANCE_FIELDS);
        let (water_height, distance) = match (height, distance) {
            (Some(h), Some(d)) => (h, d),
            (None, _) => return self.skip(key, SkipReason::MissingWaterHeight),
            (_, None) => return self.skip(key, SkipReason::MissingDistance),
        };

        let trend = self.context.observe_height(water_height);

        let risk_input = RiskInput {
            distance_cm: distance,
            rainfall_mm: weather.rainfall_mm(),
            humidity: weather
                .humidity
                .or_else(|| candidate.numeric("humidity"))
                .unwrap_or(0.0),
            temp: weather.temperature_or_zero(),
            trend: trend.clone(),
        };

        let mut sink_errors = Vec::new();

        let prediction_id = format!("pred-{}", key);
        let risk = score_risk(
            &self.client,
            &risk_input,
            &prediction_id,
            self.settings.risk_temperature,
        );
        if let Err(err) = self.sink.publish_risk(&key, &risk) {
            logging::error(Component::Store, Some(&key), &format!("publish risk failed: {}", err));
            sink_errors.push(err.to_string());
        }
        self.latest_risk = Some(risk.clone());

        let severity = AlertSeverity::for_record(
            candidate.level.as_deref(),
            water_height,
            &self.settings.thresholds,
        );
        let summary_request = SummaryRequest {
            current_level: severity.ordinal(),
            water_height,
            distance,
            rainfall: weather.rainfall_mm(),
            last_alerts: ordered
                .iter()
                .take(self.settings.summary_alert_window)
                .map(|r| AlertDigest {
                    value: first_numeric(r, HEIGHT_FIELDS),
                    ..AlertDigest::from(*r)
                })
                .collect(),
        };
        let summary = compose_summary(
            &self.client,
            &summary_request,
            self.settings.summary_temperature,
        );

        let now = Utc::now();
        let envelope = SummaryEnvelope {
            alert_key: key.clone(),
            summary: summary.output.clone(),
            request: summary_request.clone(),
            provenance: summary.provenance,
            created_at: now,
        };
        if let Err(err) = self.sink.append_summary(&envelope) {
            logging::error(Component::Store, Some(&key), &format!("append summary failed: {}", err));
            sink_errors.push(err.to_string());
        }

        let provisional_added = summary.provenance == Provenance::Fallback
            && self.feed.push_provisional(&summary.output, now);

        logging::info(
            Component::Dispatch,
            Some(&key),
            &format!(
                "dispatched via {:?}: trend {}, risk {} ({}), summary ({})",
                rule,
                trend,
                risk.output.risk_level,
                risk.provenance.as_str(),
                summary.provenance.as_str()
            ),
        );

        DispatchOutcome::Dispatched(Box::new(DispatchReport {
            key,
            rule,
            trend,
            risk_input,
            risk,
            summary_request,
            summary,
            provisional_added,
            sink_errors,
        }))
    }

    fn skip(&self, key: String, reason: SkipReason) -> DispatchOutcome {
        logging::warn(
            Component::Dispatch,
            Some(&key),
            &format!("malformed alert ({:?}), marked processed without scoring", reason),
        );
        DispatchOutcome::Skipped { key, reason }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
