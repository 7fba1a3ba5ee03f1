use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Device location acquisition settings
    #[serde(default)]
    pub location: LocationConfig,

    /// Geocoding service settings
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Upper bound on a single platform position request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the platform for its most accurate fix
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,

    /// Maximum age of a cached platform fix; 0 forces a fresh one
    #[serde(default)]
    pub maximum_age_secs: u64,

    /// Label used when reverse geocoding fails
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,

    /// Fixed device position `[lat, lon]` for hosts without a positioning service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_position: Option<[f64; 2]>,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_high_accuracy() -> bool {
    true
}

fn default_fallback_label() -> String {
    "Your Location".to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            high_accuracy: default_high_accuracy(),
            maximum_age_secs: 0,
            fallback_label: default_fallback_label(),
            device_position: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Nominatim-compatible endpoint serving `/reverse` and `/search`
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,

    /// User agent sent with every geocoding request (required by Nominatim)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP timeout for geocoding calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_user_agent() -> String {
    format!("CityPulse/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("citypulse");

        Self {
            config_dir,
            location: LocationConfig::default(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, writing defaults there if absent
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.location.timeout_secs == 0 {
            result.add_error(
                "location.timeout_secs",
                "Position timeout must be greater than 0",
            );
        } else if self.location.timeout_secs > 60 {
            result.add_warning(
                "location.timeout_secs",
                "Position timeout is more than a minute",
            );
        }

        if self.location.fallback_label.trim().is_empty() {
            result.add_error(
                "location.fallback_label",
                "Fallback label must not be empty",
            );
        }

        if let Some([lat, lon]) = self.location.device_position {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                result.add_error(
                    "location.device_position",
                    format!("Coordinates out of range: {}, {}", lat, lon),
                );
            } else if lat == 0.0 && lon == 0.0 {
                result.add_warning(
                    "location.device_position",
                    "0, 0 is treated as an unset location",
                );
            }
        }

        self.validate_url(&self.geocoding.base_url, "geocoding.base_url", &mut result);

        if self.geocoding.user_agent.trim().is_empty() {
            result.add_error("geocoding.user_agent", "User agent must not be empty");
        }

        if self.geocoding.request_timeout_secs == 0 {
            result.add_error(
                "geocoding.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Directory holding durable application state (the persisted location)
    pub fn storage_dir(&self) -> PathBuf {
        self.config_dir.join("storage")
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("citypulse");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_default_location_settings() {
        let config = Config::default();
        assert_eq!(config.location.timeout_secs, 10);
        assert!(config.location.high_accuracy);
        assert_eq!(config.location.maximum_age_secs, 0);
        assert_eq!(config.location.fallback_label, "Your Location");
        assert!(config.location.device_position.is_none());
    }

    #[test]
    fn test_invalid_geocoding_url() {
        let mut config = Config::default();
        config.geocoding.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "geocoding.base_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.geocoding.base_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.location.timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "location.timeout_secs"));
    }

    #[test]
    fn test_out_of_range_device_position() {
        let mut config = Config::default();
        config.location.device_position = Some([95.0, 10.0]);
        let result = config.validate();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_origin_device_position_is_warning() {
        let mut config = Config::default();
        config.location.device_position = Some([0.0, 0.0]);
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.field == "location.device_position"));
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.location.timeout_secs, 10);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.location.device_position = Some([51.5074, -0.1278]);
        config.geocoding.base_url = "http://localhost:9000".to_string();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location.device_position, Some([51.5074, -0.1278]));
        assert_eq!(loaded.geocoding.base_url, "http://localhost:9000");
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_dir = \"/tmp/citypulse\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.location.fallback_label, "Your Location");
        assert_eq!(config.geocoding.request_timeout_secs, 10);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
