//! Decoding of alert snapshots as delivered by the document store.
//!
//! The edge device has gone through several firmware revisions and the store
//! hands back whatever each one wrote: numbers sometimes arrive as strings,
//! timestamps as RFC 3339 text, epoch milliseconds, or server-timestamp
//! objects. The helpers here accept all of those and turn anything else into
//! an absent value instead of failing the whole batch.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::logging::{self, Component};
use crate::model::AlertRecord;

// ---------------------------------------------------------------------------
// Batch decoding
// ---------------------------------------------------------------------------

/// Decodes a full snapshot: a JSON array of alert documents.
///
/// Only text that is not a JSON array is an error. Documents are decoded one
/// at a time; see [`decode_documents`].
pub fn parse_batch(json: &str) -> Result<Vec<AlertRecord>, serde_json::Error> {
    let docs: Vec<Value> = serde_json::from_str(json)?;
    Ok(decode_documents(docs))
}

/// Decodes a single alert document.
pub fn decode_document(doc: Value) -> Result<AlertRecord, serde_json::Error> {
    serde_json::from_value(doc)
}

/// Decodes documents independently. One that still fails (for example a
/// bare number instead of an object) is logged and dropped so the rest of
/// the batch survives.
pub fn decode_documents<I>(docs: I) -> Vec<AlertRecord>
where
    I: IntoIterator<Item = Value>,
{
    docs.into_iter()
        .enumerate()
        .filter_map(|(i, doc)| match decode_document(doc) {
            Ok(record) => Some(record),
            Err(e) => {
                logging::warn(
                    Component::Store,
                    None,
                    &format!("dropping undecodable alert document #{}: {}", i, e),
                );
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Interprets a JSON value as a finite number. Numeric strings count.
pub fn value_as_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|x| x.is_finite())
}

/// Interprets a JSON value as a point in time.
///
/// Accepted shapes:
/// - RFC 3339 string, e.g. `"2025-03-14T09:26:53Z"`
/// - epoch milliseconds as a number
/// - `{"seconds": .., "nanoseconds": ..}` or `{"_seconds": .., "_nanoseconds": ..}`
pub fn value_as_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => {
            let secs = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(secs, u32::try_from(nanos).ok()?).single()
        }
        _ => None,
    }
}

/// Interprets a JSON value as text. Numbers and booleans are rendered;
/// null, arrays and objects are absent.
pub fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// serde adapter for optional text fields, see [`value_as_string`].
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<Value>::deserialize(deserializer)?;
    Ok(opt.as_ref().and_then(value_as_string))
}

/// Like [`lenient_string`], but an absent value becomes the empty string.
pub fn lenient_string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// serde adapter for optional numeric fields, see [`value_as_f64`].
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<Value>::deserialize(deserializer)?;
    Ok(opt.as_ref().and_then(value_as_f64))
}

/// serde adapter for optional timestamps, see [`value_as_timestamp`].
pub fn flexible_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<Value>::deserialize(deserializer)?;
    Ok(opt.as_ref().and_then(value_as_timestamp))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
