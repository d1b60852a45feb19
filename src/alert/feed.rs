//! Window of recent summaries shown to the user.
//!
//! Summaries persisted by the store arrive as full snapshots. A summary
//! composed locally is shown immediately as a provisional entry (id prefix
//! `local-`) and disappears once the store delivers a document with the same
//! text.

use chrono::{DateTime, Utc};

use crate::config::MAX_VISIBLE_SUMMARIES;
use crate::model::{Provenance, SummaryDocument};

pub const LOCAL_SUMMARY_PREFIX: &str = "local-";

#[derive(Debug, Clone)]
pub struct SummaryFeed {
    persisted: Vec<SummaryDocument>,
    provisional: Vec<SummaryDocument>,
    limit: usize,
    next_local: u64,
}

impl Default for SummaryFeed {
    fn default() -> Self {
        Self::new(MAX_VISIBLE_SUMMARIES)
    }
}

impl SummaryFeed {
    pub fn new(limit: usize) -> Self {
        Self {
            persisted: Vec::new(),
            provisional: Vec::new(),
            limit: limit.clamp(1, MAX_VISIBLE_SUMMARIES),
            next_local: 0,
        }
    }

    pub fn is_provisional(doc: &SummaryDocument) -> bool {
        doc.id.starts_with(LOCAL_SUMMARY_PREFIX)
    }

    fn contains_text(&self, text: &str) -> bool {
        self.persisted
            .iter()
            .chain(self.provisional.iter())
            .any(|d| d.summary == text)
    }

    /// Adds a locally composed summary unless an entry with identical text is
    /// already present. Returns whether it was added. At most `limit`
    /// provisional entries are kept; the oldest go first.
    pub fn push_provisional(&mut self, summary: &str, at: DateTime<Utc>) -> bool {
        if self.contains_text(summary) {
            return false;
        }
        self.next_local += 1;
        self.provisional.push(SummaryDocument {
            id: format!(
                "{}{}-{}",
                LOCAL_SUMMARY_PREFIX,
                at.timestamp_millis(),
                self.next_local
            ),
            summary: summary.to_string(),
            timestamp: at,
            provenance: Provenance::Fallback,
        });
        let excess = self.provisional.len().saturating_sub(self.limit);
        self.provisional.drain(..excess);
        true
    }

    /// Replaces the persisted part with the store's latest snapshot and drops
    /// provisional entries that the snapshot now covers.
    pub fn sync_persisted(&mut self, snapshot: Vec<SummaryDocument>) {
        self.persisted = snapshot
            .into_iter()
            .filter(|d| !Self::is_provisional(d))
            .collect();
        let persisted = &self.persisted;
        self.provisional
            .retain(|p| !persisted.iter().any(|d| d.summary == p.summary));
    }

    /// Visible entries, newest first, at most `limit`.
    pub fn visible(&self) -> Vec<SummaryDocument> {
        let mut all: Vec<SummaryDocument> = self
            .persisted
            .iter()
            .chain(self.provisional.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(self.limit);
        all
    }

    pub fn provisional_count(&self) -> usize {
        self.provisional.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
