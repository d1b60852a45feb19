/// Integration tests for the Postgres store.
///
/// These tests verify:
/// 1. Alert snapshots decode from JSONB documents, newest first
/// 2. Risk publications keep only the latest prediction
/// 3. Appended summaries come back through the summary snapshot
/// 4. A full dispatch against the database with inference disabled
///
/// Prerequisites:
/// - PostgreSQL running and DATABASE_URL set in .env
/// - sql/001_floodwatch.sql applied
///
/// Run with: cargo test --test store_integration -- --ignored --test-threads=1

use chrono::{TimeZone, Utc};
use postgres::{Client, NoTls};
use serde_json::json;

use floodwatch_service::alert::dispatch::{AlertDispatcher, DispatchOutcome, DispatchSettings};
use floodwatch_service::inference::DisabledClient;
use floodwatch_service::model::{
    Composed, Provenance, RiskLevel, RiskResult, SummaryRequest, WeatherContext,
};
use floodwatch_service::store::{PipelineSink, PostgresStore, SummaryEnvelope};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn database_url() -> String {
    dotenv::dotenv().ok();
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        eprintln!("\n{}\n", "=".repeat(80));
        eprintln!("INTEGRATION TEST SETUP ERROR");
        eprintln!("{}", "=".repeat(80));
        eprintln!("\nDATABASE_URL is not set. Add it to .env and apply the schema:\n");
        eprintln!("  psql \"$DATABASE_URL\" -f sql/001_floodwatch.sql\n");
        panic!("Database setup validation failed");
    })
}

fn raw_client() -> Client {
    Client::connect(&database_url(), NoTls).expect("Failed to connect to test database")
}

fn cleanup_test_data(client: &mut Client) {
    let _ = client.execute("DELETE FROM alerts WHERE id LIKE 'TEST%'", &[]);
    let _ = client.execute("DELETE FROM summaries WHERE alert_key LIKE 'TEST%'", &[]);
    let _ = client.execute("DELETE FROM latest_prediction WHERE alert_key LIKE 'TEST%'", &[]);
}

fn insert_alert(client: &mut Client, id: &str, payload: serde_json::Value, minute: u32) {
    let created_at = Utc.with_ymd_and_hms(2099, 1, 1, 0, minute, 0).unwrap();
    client
        .execute(
            "INSERT INTO alerts (id, payload, created_at) VALUES ($1, $2, $3)",
            &[&id, &payload, &created_at],
        )
        .expect("Failed to insert test alert");
}

// ---------------------------------------------------------------------------
// Snapshot Tests
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_alert_snapshot_is_newest_first_and_keyed_by_row() {
    let mut raw = raw_client();
    cleanup_test_data(&mut raw);

    insert_alert(&mut raw, "TEST-old", json!({"sensor": "flood", "value": 12, "distance": 8}), 0);
    insert_alert(&mut raw, "TEST-new", json!({"sensor": "flood", "value": "15.5", "distance": 4}), 5);

    let mut store = PostgresStore::connect(&database_url()).expect("store should connect");
    let alerts = store.fetch_recent_alerts(2).expect("snapshot query failed");

    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].id.as_deref(), Some("TEST-new"), "row id fills a missing document id");
    assert_eq!(alerts[0].value, Some(15.5));
    assert_eq!(alerts[1].id.as_deref(), Some("TEST-old"));

    cleanup_test_data(&mut raw);
}

#[test]
#[ignore]
fn test_undecodable_row_is_left_out_of_snapshot() {
    let mut raw = raw_client();
    cleanup_test_data(&mut raw);

    insert_alert(&mut raw, "TEST-ok", json!({"sensor": "flood", "value": 16, "distance": 4}), 0);
    insert_alert(&mut raw, "TEST-num", json!(17), 5);
    insert_alert(&mut raw, "TEST-typed", json!({"id": 42, "sensor": null, "level": 3}), 4);

    let mut store = PostgresStore::connect(&database_url()).expect("store should connect");
    let alerts = store.fetch_recent_alerts(3).expect("a bad row must not fail the snapshot");

    let ids: Vec<_> = alerts.iter().filter_map(|a| a.id.clone()).collect();
    assert_eq!(ids, vec!["42".to_string(), "TEST-ok".to_string()]);

    cleanup_test_data(&mut raw);
}

#[test]
#[ignore]
fn test_latest_prediction_is_replaced() {
    let mut raw = raw_client();
    cleanup_test_data(&mut raw);

    let mut store = PostgresStore::connect(&database_url()).expect("store should connect");
    for (key, level) in [("TEST-p1", RiskLevel::Low), ("TEST-p2", RiskLevel::High)] {
        let risk = Composed {
            output: RiskResult {
                risk_level: level,
                explanation: format!("{} risk — test.", level),
                prediction_id: format!("pred-{}", key),
            },
            provenance: Provenance::Fallback,
            advisory: None,
        };
        store.publish_risk(key, &risk).expect("publish failed");
    }

    let rows = raw
        .query("SELECT alert_key, risk_level FROM latest_prediction", &[])
        .expect("query failed");
    assert_eq!(rows.len(), 1, "only one prediction row is ever kept");
    let key: String = rows[0].get(0);
    let level: String = rows[0].get(1);
    assert_eq!(key, "TEST-p2");
    assert_eq!(level, "High");

    cleanup_test_data(&mut raw);
}

#[test]
#[ignore]
fn test_appended_summary_round_trips() {
    let mut raw = raw_client();
    cleanup_test_data(&mut raw);

    let mut store = PostgresStore::connect(&database_url()).expect("store should connect");
    let envelope = SummaryEnvelope {
        alert_key: "TEST-s1".to_string(),
        summary: "**TEST summary**".to_string(),
        request: SummaryRequest {
            current_level: 2,
            water_height: 15.0,
            distance: 5.0,
            rainfall: 1.5,
            last_alerts: vec![],
        },
        provenance: Provenance::Fallback,
        created_at: Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap(),
    };
    store.append_summary(&envelope).expect("append failed");

    let docs = store.fetch_recent_summaries(20).expect("summary query failed");
    let doc = docs
        .iter()
        .find(|d| d.summary == "**TEST summary**")
        .expect("appended summary should be in the snapshot");
    assert_eq!(doc.provenance, Provenance::Fallback);
    assert_eq!(doc.timestamp, envelope.created_at);

    cleanup_test_data(&mut raw);
}

// ---------------------------------------------------------------------------
// Full Pipeline
// ---------------------------------------------------------------------------

#[test]
#[ignore]
fn test_dispatch_against_database_with_inference_disabled() {
    let mut raw = raw_client();
    cleanup_test_data(&mut raw);

    insert_alert(
        &mut raw,
        "TEST-d1",
        json!({"id": "TEST-d1", "sensor": "flood", "level": "critical", "value": 18.2, "distance": 1.8}),
        10,
    );

    let mut reader = PostgresStore::connect(&database_url()).expect("store should connect");
    let writer = PostgresStore::connect(&database_url()).expect("store should connect");
    let mut dispatcher = AlertDispatcher::new(
        DisabledClient::new("integration test"),
        writer,
        DispatchSettings::default(),
    );

    let batch = reader.fetch_recent_alerts(1).expect("snapshot query failed");
    match dispatcher.on_batch(&batch, &WeatherContext::default()) {
        DispatchOutcome::Dispatched(report) => {
            assert_eq!(report.key, "TEST-d1");
            assert_eq!(report.risk.provenance, Provenance::Fallback);
            assert!(report.sink_errors.is_empty(), "sink errors: {:?}", report.sink_errors);
        }
        other => panic!("expected dispatch, got {:?}", other),
    }

    let persisted = reader.fetch_recent_summaries(20).expect("summary query failed");
    dispatcher.sync_summaries(persisted);
    assert!(
        dispatcher
            .visible_summaries()
            .iter()
            .all(|d| !d.id.starts_with("local-")),
        "persisted copy replaces the provisional entry"
    );

    cleanup_test_data(&mut raw);
}
