//! Polling daemon: reads alert snapshots from Postgres and runs each one
//! through the dispatch loop.
//!
//! Usage: floodwatch_service [config path]

use std::error::Error;
use std::thread;
use std::time::Duration;

use floodwatch_service::alert::dispatch::{AlertDispatcher, DispatchOutcome};
use floodwatch_service::config::{DEFAULT_CONFIG_PATH, MAX_VISIBLE_SUMMARIES, load_or_default};
use floodwatch_service::logging::{self, Component};
use floodwatch_service::model::WeatherContext;
use floodwatch_service::store::PostgresStore;

fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_or_default(&path)?;

    if let Err(e) = logging::init_logger(config.logging.level, config.logging.file.as_deref()) {
        eprintln!("failed to initialize logging: {}", e);
    }

    let Some(database_url) = config.store.database_url.clone() else {
        logging::error(Component::System, None, "DATABASE_URL is not set");
        return Err("DATABASE_URL is not set".into());
    };

    // Reads and writes use separate connections; the dispatcher owns the writer.
    let mut reader = PostgresStore::connect(&database_url)?;
    let writer = PostgresStore::connect(&database_url)?;
    let mut dispatcher = AlertDispatcher::from_config(&config, writer);

    logging::info(
        Component::System,
        None,
        &format!(
            "floodwatch started (inference {}, model {}, poll every {}s)",
            if config.inference.enabled { "enabled" } else { "disabled" },
            config.inference.model,
            config.store.poll_interval_secs
        ),
    );

    let interval = Duration::from_secs(config.store.poll_interval_secs);
    loop {
        match reader.fetch_recent_alerts(config.store.snapshot_size) {
            Ok(batch) => {
                let weather = match reader.fetch_latest_weather() {
                    Ok(w) => w.unwrap_or_default(),
                    Err(e) => {
                        logging::warn(Component::Weather, None, &format!("weather unavailable: {}", e));
                        WeatherContext::default()
                    }
                };
                if let DispatchOutcome::Dispatched(report) = dispatcher.on_batch(&batch, &weather) {
                    if let Some(advisory) = report.advisory() {
                        logging::warn(Component::Dispatch, Some(&report.key), advisory);
                    }
                }
            }
            Err(e) => logging::error(Component::Store, None, &format!("alert snapshot failed: {}", e)),
        }

        match reader.fetch_recent_summaries(MAX_VISIBLE_SUMMARIES as i64) {
            Ok(snapshot) => dispatcher.sync_summaries(snapshot),
            Err(e) => logging::warn(Component::Store, None, &format!("summary snapshot failed: {}", e)),
        }

        thread::sleep(interval);
    }
}
