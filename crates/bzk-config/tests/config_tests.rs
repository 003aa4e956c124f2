use std::fs;

use bzk_config::{Config, ConfigManager};
use rust_decimal_macros::dec;
use tempfile::tempdir;

#[test]
fn default_config_matches_shipped_presets() {
    let cfg = Config::default();

    assert_eq!(cfg.locale, "en-US");
    assert_eq!(cfg.currency, "USD");
    assert_eq!(cfg.default_limit, dec!(50));
    assert_eq!(cfg.limit_step, dec!(5));
    assert_eq!(cfg.presets(), vec![dec!(30), dec!(50), dec!(100)]);
    assert_eq!(cfg.near_limit_threshold(), Some(80));
    assert_eq!(cfg.suggested_limit(), dec!(50));
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path()).expect("manager");

    assert!(!manager.config_path().exists());
    assert_eq!(manager.load().expect("load"), Config::default());
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"));

    let mut cfg = Config::default();
    cfg.currency = "EUR".to_string();
    cfg.last_limit = Some(dec!(72.50));
    cfg.near_limit_warning.enabled = false;

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded, cfg);
    assert_eq!(loaded.suggested_limit(), dec!(72.50));
    assert_eq!(loaded.near_limit_threshold(), None);
}

#[test]
fn partial_file_fills_missing_fields() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path()).expect("manager");
    fs::write(
        manager.config_path(),
        r#"{ "currency": "GBP", "preset_limits": ["100", "20", "20", "-5"] }"#,
    )
    .expect("write");

    let cfg = manager.load().expect("load");
    assert_eq!(cfg.currency, "GBP");
    assert_eq!(cfg.locale, "en-US");
    assert_eq!(cfg.backup_retention, 5);
    assert_eq!(cfg.presets(), vec![dec!(20), dec!(100)]);
}

#[test]
fn update_round_trips_through_disk() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path()).expect("manager");

    manager
        .update(|cfg| cfg.last_limit = Some(dec!(40)))
        .expect("update");

    assert_eq!(manager.load().expect("load").last_limit, Some(dec!(40)));
}
