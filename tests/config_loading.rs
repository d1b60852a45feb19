/// Tests for loading the shipped configuration file.
///
/// Run with: cargo test --test config_loading

use floodwatch_service::alert::dispatch::DispatchSettings;
use floodwatch_service::config::{DEFAULT_CONFIG_PATH, ServiceConfig, load_config, parse_config};
use floodwatch_service::logging::LogLevel;

#[test]
fn test_shipped_config_matches_defaults() {
    let text = std::fs::read_to_string(DEFAULT_CONFIG_PATH)
        .expect("floodwatch.toml should exist at the crate root");
    let shipped = parse_config(&text).expect("shipped config should parse");
    let defaults = ServiceConfig::default();

    assert_eq!(shipped.inference.endpoint, defaults.inference.endpoint);
    assert_eq!(shipped.inference.model, defaults.inference.model);
    assert_eq!(shipped.inference.api_key_env, defaults.inference.api_key_env);
    assert_eq!(shipped.inference.risk_temperature, defaults.inference.risk_temperature);
    assert_eq!(shipped.inference.summary_temperature, defaults.inference.summary_temperature);
    assert_eq!(shipped.thresholds, defaults.thresholds);
    assert_eq!(shipped.logging.level, LogLevel::Info);
    assert_eq!(shipped.store.poll_interval_secs, defaults.store.poll_interval_secs);
    assert!(
        shipped.inference.api_key.is_none(),
        "the API key is never read from the file"
    );
}

#[test]
fn test_load_config_reads_file_from_disk() {
    let config = load_config(DEFAULT_CONFIG_PATH).expect("shipped config should load");
    assert_eq!(config.dispatch.summary_alert_window, 5);
    assert_eq!(config.dispatch.visible_summary_limit, 20);
}

#[test]
fn test_dispatch_settings_follow_config() {
    let config = parse_config(
        r#"
        [inference]
        risk_temperature = 0.1
        summary_temperature = 0.5

        [dispatch]
        summary_alert_window = 3

        [thresholds]
        critical_cm = 20.0
        "#,
    )
    .expect("valid TOML");

    let settings = DispatchSettings::from(&config);
    assert_eq!(settings.risk_temperature, 0.1);
    assert_eq!(settings.summary_temperature, 0.5);
    assert_eq!(settings.summary_alert_window, 3);
    assert_eq!(settings.thresholds.critical_cm, 20.0);
    assert_eq!(settings.visible_summary_limit, 20);
}

#[test]
fn test_malformed_config_is_rejected() {
    let err = parse_config("[inference]\nenabled = \"sometimes\"").unwrap_err();
    assert!(
        err.to_string().contains("enabled") || err.to_string().contains("bool"),
        "error should point at the bad key, got: {}",
        err
    );
}
