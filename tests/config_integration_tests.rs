//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Default settings generation
//! - Settings loading and saving
//! - Partial documents falling back to defaults
//! - Environment overrides
//! - Integration with StateManager

use camino::Utf8PathBuf;
use mmo_pilot::models::Jitter;
use mmo_pilot::{ConfigManager, Settings, StateManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), config_path.as_path());
    assert_eq!(manager.settings_path(), config_path.join("mmo-pilot.yaml").as_path());
}

#[test]
fn test_load_default_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = manager.load_settings().unwrap();

    assert_eq!(settings.browser.debug_address, "127.0.0.1:9222");
    assert_eq!(settings.gather.max_consecutive_failures, 3);
    assert_eq!(settings.gather.safety_margin, 5);
    assert_eq!(settings.dispatch.energy_floor, 10);
    assert_eq!(settings.dispatch.error_budget, 10);
    assert!(settings.bot.attack_mode);
    assert!(settings.bot.gather_mode);

    // The defaults were written out for the user to edit
    assert!(manager.settings_path().exists());
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut settings = Settings::default();
    settings.bot.gather_mode = false;
    settings.site.base_url = "https://mmo.example.test".to_string();
    settings.dispatch.idle_backoff = Jitter::new(6.0, 1.0);
    manager.save_settings(&settings).unwrap();

    let loaded = manager.load_settings().unwrap();
    assert!(!loaded.bot.gather_mode);
    assert_eq!(loaded.site.travel_url(), "https://mmo.example.test/travel");
    assert_eq!(loaded.dispatch.idle_backoff, Jitter::new(6.0, 1.0));
}

#[test]
fn test_partial_document_keeps_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.settings_path(),
        "combat:\n  max_attacks: 40\nbot:\n  attack_mode: false\n",
    )
    .unwrap();

    let settings = manager.load_settings().unwrap();
    assert_eq!(settings.combat.max_attacks, 40);
    assert_eq!(settings.combat.max_consecutive_timeouts, 8);
    assert!(!settings.bot.attack_mode);
    assert!(settings.bot.gather_mode);
    assert_eq!(settings.gather, Settings::default().gather);
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // SAFETY: no other test in this binary reads or writes this variable
    unsafe {
        std::env::set_var("MMO_PILOT_BROWSER__START_URL", "https://mmo.example.test/travel");
    }
    let settings = manager.load_settings();
    unsafe {
        std::env::remove_var("MMO_PILOT_BROWSER__START_URL");
    }

    assert_eq!(
        settings.unwrap().browser.start_url,
        "https://mmo.example.test/travel"
    );
}

#[test]
fn test_config_integration_with_state() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.settings_path(), "bot:\n  gather_mode: false\n").unwrap();
    let settings = manager.load_settings().unwrap();

    let state = StateManager::from_settings(&settings.bot);
    let configuration = state.configuration();
    assert!(configuration.attack_mode_enabled);
    assert!(!configuration.gather_mode_enabled);
}

#[test]
fn test_config_directory_creation() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())
        .unwrap()
        .join("nonexistent_dir");

    assert!(!config_path.exists());
    let _manager = ConfigManager::new(&config_path).unwrap();
    assert!(config_path.exists());
}

#[test]
fn test_invalid_yaml_handling() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.settings_path(), "invalid: yaml: content: {{").unwrap();

    let result = manager.load_settings();
    assert!(result.is_err(), "Should fail to parse invalid YAML");
}

#[test]
fn test_concurrent_config_access() {
    use std::sync::Arc;

    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = Arc::new(ConfigManager::new(&config_path).unwrap());
    manager.save_settings(&Settings::default()).unwrap();

    let mut handles = vec![];
    for _ in 0..10 {
        let manager_clone = manager.clone();
        handles.push(std::thread::spawn(move || {
            manager_clone.load_settings().unwrap();
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}
