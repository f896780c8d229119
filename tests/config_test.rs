//! Unit tests for config.rs module

use std::fs;

use inspection_features::config::{AppConfig, CacheConfig, LoggingConfig};
use tempfile::tempdir;

#[test]
fn test_default_data_paths() {
    let config = AppConfig::default();

    assert_eq!(config.data.crosswalk, "data/restaurant_ids_to_yelp_ids.csv");
    assert_eq!(config.data.tips, "data/yelp_academic_dataset_tip.json");
    assert_eq!(config.data.checkins, "data/yelp_academic_dataset_checkin.json");
    assert_eq!(config.data.train_labels, "data/train_labels.csv");
    assert_eq!(config.data.submission, "data/SubmissionFormat.csv");
}

#[test]
fn test_default_pipeline_config() {
    let config = AppConfig::default();

    assert_eq!(config.pipeline.progress_interval, 2500);
    assert!(!config.pipeline.parallel);
    assert_eq!(config.pipeline.unknown_train_labels, "empty");
    assert_eq!(config.pipeline.unknown_test_labels, "empty");
}

#[test]
fn test_default_logging_and_export_config() {
    let config = AppConfig::default();

    assert_eq!(config.cache.directory, "models");
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.file_path, None);
    assert_eq!(config.logging.format, "text");
    assert_eq!(config.export.default_format, "csv");
    assert_eq!(config.export.output_directory, "./output");
}

#[test]
fn test_config_validation_success() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_empty_data_path() {
    let mut config = AppConfig::default();
    config.data.reviews = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_zero_progress_interval() {
    let mut config = AppConfig::default();
    config.pipeline.progress_interval = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_unknown_label_policies() {
    for policy in ["empty", "reject"] {
        let mut config = AppConfig::default();
        config.pipeline.unknown_train_labels = policy.to_string();
        config.pipeline.unknown_test_labels = policy.to_string();
        assert!(config.validate().is_ok(), "Failed for policy: {}", policy);
    }

    let mut config = AppConfig::default();
    config.pipeline.unknown_test_labels = "drop".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_empty_cache_directory() {
    let mut config = AppConfig::default();
    config.cache = CacheConfig {
        directory: String::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_log_levels() {
    for level in ["trace", "debug", "info", "warn", "error"] {
        let mut config = AppConfig::default();
        config.logging.level = level.to_string();
        assert!(config.validate().is_ok(), "Failed for level: {}", level);
    }

    let mut config = AppConfig::default();
    config.logging.level = "invalid".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_log_format() {
    let mut config = AppConfig::default();
    config.logging = LoggingConfig {
        level: "debug".to_string(),
        file_path: Some("/var/log/features.log".to_string()),
        format: "json".to_string(),
    };
    assert!(config.validate().is_ok());

    config.logging.format = "xml".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_export_formats() {
    for format in ["csv", "json"] {
        let mut config = AppConfig::default();
        config.export.default_format = format.to_string();
        assert!(config.validate().is_ok(), "Failed for format: {}", format);
    }

    let mut config = AppConfig::default();
    config.export.default_format = "txt".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_defaults_flatten_to_dotted_keys() {
    let keys: Vec<String> = AppConfig::default().into_iter().map(|(key, _)| key).collect();

    assert!(keys.contains(&"data.reviews".to_string()));
    assert!(keys.contains(&"pipeline.progress_interval".to_string()));
    assert!(keys.contains(&"export.output_directory".to_string()));
    // unset optional values are left out
    assert!(!keys.contains(&"logging.file_path".to_string()));
}

#[test]
fn test_load_from_file_overrides_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.toml");
    fs::write(
        &path,
        "[pipeline]\nparallel = true\nunknown_test_labels = \"reject\"\n\n[cache]\ndirectory = \"/tmp/cache\"\n",
    )
    .unwrap();

    let config = AppConfig::load_from(Some(&path)).unwrap();

    assert!(config.pipeline.parallel);
    assert_eq!(config.pipeline.unknown_test_labels, "reject");
    assert_eq!(config.pipeline.unknown_train_labels, "empty");
    assert_eq!(config.cache.directory, "/tmp/cache");
    assert_eq!(config.data.reviews, "data/yelp_academic_dataset_review.json");
}

#[test]
fn test_load_from_file_rejects_invalid_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("features.toml");
    fs::write(&path, "[logging]\nformat = \"xml\"\n").unwrap();

    assert!(AppConfig::load_from(Some(&path)).is_err());
}

#[test]
fn test_load_from_missing_file_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(AppConfig::load_from(Some(&path)).is_err());
}

#[test]
fn test_config_clone() {
    let config = AppConfig::default();
    let cloned = config.clone();
    assert_eq!(config.data.users, cloned.data.users);
    assert_eq!(config.logging.level, cloned.logging.level);
}
