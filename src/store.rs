//! Hand-off of pipeline results to durable storage.
//!
//! The pipeline publishes two things: the most recent risk prediction (only
//! the latest is kept) and every composed summary together with the request
//! it was built from and its provenance. [`PipelineSink`] is that boundary;
//! [`PostgresStore`] is the durable implementation and [`MemorySink`] keeps
//! results in process for daemons running without a database.
//!
//! Expected schema: `sql/001_floodwatch.sql`.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls};
use thiserror::Error;

use crate::ingest::records::decode_document;
use crate::logging::{self, Component};
use crate::model::{
    AlertRecord, Composed, Provenance, RiskResult, SummaryDocument, SummaryRequest, WeatherContext,
};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("payload encoding error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown provenance tag {0:?}")]
    Provenance(String),
}

/// A composed summary ready for durable append.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEnvelope {
    pub alert_key: String,
    pub summary: String,
    pub request: SummaryRequest,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

pub trait PipelineSink {
    /// Replaces the stored prediction with `risk`.
    fn publish_risk(&mut self, alert_key: &str, risk: &Composed<RiskResult>) -> Result<(), StoreError>;

    fn append_summary(&mut self, envelope: &SummaryEnvelope) -> Result<(), StoreError>;
}

impl<S: PipelineSink + ?Sized> PipelineSink for &mut S {
    fn publish_risk(&mut self, alert_key: &str, risk: &Composed<RiskResult>) -> Result<(), StoreError> {
        (**self).publish_risk(alert_key, risk)
    }

    fn append_summary(&mut self, envelope: &SummaryEnvelope) -> Result<(), StoreError> {
        (**self).append_summary(envelope)
    }
}

// ---------------------------------------------------------------------------
// In-process sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    latest_risk: Option<(String, Composed<RiskResult>)>,
    risk_publications: usize,
    summaries: Vec<SummaryEnvelope>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_risk(&self) -> Option<&(String, Composed<RiskResult>)> {
        self.latest_risk.as_ref()
    }

    pub fn risk_publications(&self) -> usize {
        self.risk_publications
    }

    pub fn summaries(&self) -> &[SummaryEnvelope] {
        &self.summaries
    }

    /// Stored summaries as the store would deliver them, newest first.
    pub fn summary_documents(&self) -> Vec<SummaryDocument> {
        self.summaries
            .iter()
            .enumerate()
            .rev()
            .map(|(i, e)| SummaryDocument {
                id: format!("mem-{}", i + 1),
                summary: e.summary.clone(),
                timestamp: e.created_at,
                provenance: e.provenance,
            })
            .collect()
    }
}

impl PipelineSink for MemorySink {
    fn publish_risk(&mut self, alert_key: &str, risk: &Composed<RiskResult>) -> Result<(), StoreError> {
        self.latest_risk = Some((alert_key.to_string(), risk.clone()));
        self.risk_publications += 1;
        Ok(())
    }

    fn append_summary(&mut self, envelope: &SummaryEnvelope) -> Result<(), StoreError> {
        self.summaries.push(envelope.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Postgres store
// ---------------------------------------------------------------------------

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let client = Client::connect(database_url, NoTls)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Latest alert documents, newest first, as a full batch snapshot.
    ///
    /// Documents stored without an `id` field get the row id. A document that
    /// cannot be decoded is logged and left out of the snapshot.
    pub fn fetch_recent_alerts(&mut self, limit: i64) -> Result<Vec<AlertRecord>, StoreError> {
        let rows = self.client.query(
            "SELECT id, payload
             FROM alerts
             ORDER BY created_at DESC
             LIMIT $1",
            &[&limit],
        )?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get(0);
            let payload: serde_json::Value = row.get(1);
            let mut record = match decode_document(payload) {
                Ok(record) => record,
                Err(e) => {
                    logging::warn(
                        Component::Store,
                        Some(&id),
                        &format!("skipping undecodable alert row: {}", e),
                    );
                    continue;
                }
            };
            if record.id.as_deref().map_or(true, |s| s.trim().is_empty()) {
                record.id = Some(id);
            }
            alerts.push(record);
        }
        Ok(alerts)
    }

    /// Most recent current-conditions payload, if any has been recorded.
    pub fn fetch_latest_weather(&mut self) -> Result<Option<WeatherContext>, StoreError> {
        let row = self.client.query_opt(
            "SELECT payload
             FROM weather_snapshots
             ORDER BY observed_at DESC
             LIMIT 1",
            &[],
        )?;
        Ok(row.map(|r| {
            let payload: serde_json::Value = r.get(0);
            WeatherContext::from_openweather(&payload)
        }))
    }

    /// Latest persisted summaries, newest first.
    pub fn fetch_recent_summaries(&mut self, limit: i64) -> Result<Vec<SummaryDocument>, StoreError> {
        let rows = self.client.query(
            "SELECT id::text, summary, created_at, provenance
             FROM summaries
             ORDER BY created_at DESC
             LIMIT $1",
            &[&limit],
        )?;

        rows.into_iter()
            .map(|row| {
                let tag: String = row.get(3);
                let provenance =
                    Provenance::parse(&tag).ok_or_else(|| StoreError::Provenance(tag.clone()))?;
                Ok(SummaryDocument {
                    id: row.get(0),
                    summary: row.get(1),
                    timestamp: row.get(2),
                    provenance,
                })
            })
            .collect()
    }
}

impl PipelineSink for PostgresStore {
    fn publish_risk(&mut self, alert_key: &str, risk: &Composed<RiskResult>) -> Result<(), StoreError> {
        self.client.execute(
            "INSERT INTO latest_prediction
                 (slot, alert_key, risk_level, explanation, prediction_id, provenance, updated_at)
             VALUES (1, $1, $2, $3, $4, $5, $6)
             ON CONFLICT (slot) DO UPDATE SET
                 alert_key = EXCLUDED.alert_key,
                 risk_level = EXCLUDED.risk_level,
                 explanation = EXCLUDED.explanation,
                 prediction_id = EXCLUDED.prediction_id,
                 provenance = EXCLUDED.provenance,
                 updated_at = EXCLUDED.updated_at",
            &[
                &alert_key,
                &risk.output.risk_level.as_str(),
                &risk.output.explanation,
                &risk.output.prediction_id,
                &risk.provenance.as_str(),
                &Utc::now(),
            ],
        )?;
        Ok(())
    }

    fn append_summary(&mut self, envelope: &SummaryEnvelope) -> Result<(), StoreError> {
        let request = serde_json::to_value(&envelope.request)?;
        self.client.execute(
            "INSERT INTO summaries (alert_key, summary, request, provenance, created_at)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &envelope.alert_key,
                &envelope.summary,
                &request,
                &envelope.provenance.as_str(),
                &envelope.created_at,
            ],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
