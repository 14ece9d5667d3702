//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate integrations and their topic templates
//! - Produce a `ServiceConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("integrations.toml")).unwrap();
//! println!("Integrations: {}", config.integrations.len());
//! ```

mod parser;
mod validator;

pub use contracts::ServiceConfig;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<ServiceConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<ServiceConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Serialize ServiceConfig to TOML string
    pub fn to_toml(config: &ServiceConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize ServiceConfig to JSON string
    pub fn to_json(config: &ServiceConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<ServiceConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[observability]
log_format = "pretty"

[[integrations]]
name = "broker"
type = "mqtt"
[integrations.mqtt]
server = "tcp://127.0.0.1:1883"
marshaler = "protobuf"
[integrations.mqtt.topics]
uplink = "app/{appID}/device/{devEUI}/rx"

[[integrations]]
name = "debug"
type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.integrations.len(), 2);
        assert_eq!(config.integrations[0].name, "broker");
    }

    #[test]
    fn test_round_trip_toml() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(config.integrations.len(), config2.integrations.len());
        assert_eq!(
            config.integrations[0].mqtt.as_ref().unwrap().topics.uplink,
            config2.integrations[0].mqtt.as_ref().unwrap().topics.uplink
        );
    }

    #[test]
    fn test_round_trip_json() {
        let config = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&config).unwrap();
        let config2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(config.integrations[1].name, config2.integrations[1].name);
        assert_eq!(
            config.observability.log_format,
            config2.observability.log_format
        );
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[[integrations]]
name = "debug"
type = "log"

[[integrations]]
name = "debug"
type = "log"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.integrations.len(), 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_from_path(Path::new("/nonexistent/integrations.toml"))
            .unwrap_err();
        assert!(matches!(err, ContractError::Io(_)));
    }
}
