use crate::error::{PipelineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub pipeline: PipelineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub export: ExportConfig,
}

/// Location of each input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub crosswalk: String,
    pub reviews: String,
    pub tips: String,
    pub users: String,
    pub businesses: String,
    pub checkins: String,
    pub train_labels: String,
    pub submission: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub progress_interval: usize,
    pub parallel: bool,
    pub unknown_train_labels: String, // "empty" or "reject"
    pub unknown_test_labels: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub default_format: String,
    pub output_directory: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig {
                crosswalk: "data/restaurant_ids_to_yelp_ids.csv".to_string(),
                reviews: "data/yelp_academic_dataset_review.json".to_string(),
                tips: "data/yelp_academic_dataset_tip.json".to_string(),
                users: "data/yelp_academic_dataset_user.json".to_string(),
                businesses: "data/yelp_academic_dataset_business.json".to_string(),
                checkins: "data/yelp_academic_dataset_checkin.json".to_string(),
                train_labels: "data/train_labels.csv".to_string(),
                submission: "data/SubmissionFormat.csv".to_string(),
            },
            pipeline: PipelineConfig {
                progress_interval: 2500,
                parallel: false,
                unknown_train_labels: "empty".to_string(),
                unknown_test_labels: "empty".to_string(),
            },
            cache: CacheConfig {
                directory: "models".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            export: ExportConfig {
                default_format: "csv".to_string(),
                output_directory: "./output".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file locations and environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with precedence: defaults, config files, an explicit
    /// file (if given), then `INSPECTION_FEATURES__SECTION__KEY` variables
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        for (key, value) in AppConfig::default() {
            builder = builder.set_default(key, value)?;
        }

        builder = builder
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false));
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("INSPECTION_FEATURES")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        let data_paths = [
            ("crosswalk", &self.data.crosswalk),
            ("reviews", &self.data.reviews),
            ("tips", &self.data.tips),
            ("users", &self.data.users),
            ("businesses", &self.data.businesses),
            ("checkins", &self.data.checkins),
            ("train_labels", &self.data.train_labels),
            ("submission", &self.data.submission),
        ];
        for (name, path) in data_paths {
            if path.trim().is_empty() {
                return invalid(format!("data.{name} must not be empty"));
            }
        }

        if self.pipeline.progress_interval == 0 {
            return invalid("progress_interval must be greater than 0".to_string());
        }

        let valid_policies = ["empty", "reject"];
        for policy in [
            &self.pipeline.unknown_train_labels,
            &self.pipeline.unknown_test_labels,
        ] {
            if !valid_policies.contains(&policy.as_str()) {
                return invalid(format!(
                    "Invalid unknown label policy: {policy}. Must be one of: {valid_policies:?}"
                ));
            }
        }

        if self.cache.directory.trim().is_empty() {
            return invalid("cache.directory must not be empty".to_string());
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return invalid(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return invalid(format!(
                "Invalid log format: {}. Must be one of: {valid_formats:?}",
                self.logging.format
            ));
        }

        // Validate export config
        let valid_formats = ["csv", "json"];
        if !valid_formats.contains(&self.export.default_format.as_str()) {
            return invalid(format!(
                "Invalid export format: {}. Must be one of: {valid_formats:?}",
                self.export.default_format
            ));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

impl IntoIterator for AppConfig {
    type Item = (String, config::Value);
    type IntoIter = std::collections::hash_map::IntoIter<String, config::Value>;

    fn into_iter(self) -> Self::IntoIter {
        let mut map = std::collections::HashMap::new();

        // Flatten the configuration into key-value pairs
        map.insert("data.crosswalk".to_string(), config::Value::from(self.data.crosswalk));
        map.insert("data.reviews".to_string(), config::Value::from(self.data.reviews));
        map.insert("data.tips".to_string(), config::Value::from(self.data.tips));
        map.insert("data.users".to_string(), config::Value::from(self.data.users));
        map.insert("data.businesses".to_string(), config::Value::from(self.data.businesses));
        map.insert("data.checkins".to_string(), config::Value::from(self.data.checkins));
        map.insert("data.train_labels".to_string(), config::Value::from(self.data.train_labels));
        map.insert("data.submission".to_string(), config::Value::from(self.data.submission));

        map.insert(
            "pipeline.progress_interval".to_string(),
            config::Value::from(i64::try_from(self.pipeline.progress_interval).unwrap_or(i64::MAX)),
        );
        map.insert("pipeline.parallel".to_string(), config::Value::from(self.pipeline.parallel));
        map.insert(
            "pipeline.unknown_train_labels".to_string(),
            config::Value::from(self.pipeline.unknown_train_labels),
        );
        map.insert(
            "pipeline.unknown_test_labels".to_string(),
            config::Value::from(self.pipeline.unknown_test_labels),
        );

        map.insert("cache.directory".to_string(), config::Value::from(self.cache.directory));

        map.insert("logging.level".to_string(), config::Value::from(self.logging.level));
        if let Some(file_path) = self.logging.file_path {
            map.insert("logging.file_path".to_string(), config::Value::from(file_path));
        }
        map.insert("logging.format".to_string(), config::Value::from(self.logging.format));

        map.insert("export.default_format".to_string(), config::Value::from(self.export.default_format));
        map.insert("export.output_directory".to_string(), config::Value::from(self.export.output_directory));

        map.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.data.reviews, "data/yelp_academic_dataset_review.json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.pipeline.progress_interval, 2500);
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.pipeline.progress_interval = 0;
        assert!(config.validate().is_err());
    }
}
