// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for the install script generator

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GenerateError, Result};

/// Main configuration structure, loaded from an optional TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Director connection settings
    #[serde(default)]
    pub director: DirectorConfig,

    /// Deployment selection settings
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Installer defaults written into the script
    #[serde(default)]
    pub installer: InstallerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Director and UAA connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// OAuth client used for the password grant
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Scope requested from UAA
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Which deployment counts as the Diego cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Release names that must all be present in the deployment
    #[serde(default = "default_required_releases")]
    pub required_releases: Vec<String>,
}

/// Values the installer needs that the manifest does not carry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Redundancy zone label for the cell
    #[serde(default = "default_redundancy_zone")]
    pub redundancy_zone: String,

    /// Stack name advertised by the cell
    #[serde(default = "default_stack")]
    pub stack: String,

    /// Consul domain used when the manifest does not set one
    #[serde(default = "default_consul_domain")]
    pub consul_domain: String,

    /// File name of the generated script
    #[serde(default = "default_script_name")]
    pub script_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl DirectorConfig {
    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            client_id: default_client_id(),
            scope: default_scope(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            required_releases: default_required_releases(),
        }
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            redundancy_zone: default_redundancy_zone(),
            stack: default_stack(),
            consul_domain: default_consul_domain(),
            script_name: default_script_name(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(GenerateError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.director.timeout_secs == 0 {
            return Err(GenerateError::InvalidConfig {
                message: "director.timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.selection.required_releases.is_empty() {
            return Err(GenerateError::InvalidConfig {
                message: "selection.required_releases cannot be empty".to_string(),
            });
        }

        if self.installer.script_name.is_empty()
            || self.installer.script_name.contains(['/', '\\'])
        {
            return Err(GenerateError::InvalidConfig {
                message: format!(
                    "installer.script_name must be a plain file name, got '{}'",
                    self.installer.script_name
                ),
            });
        }

        Ok(())
    }
}

// Default value functions

fn default_timeout_secs() -> u64 {
    10
}

fn default_client_id() -> String {
    "bosh_cli".to_string()
}

fn default_scope() -> String {
    "bosh.read".to_string()
}

fn default_required_releases() -> Vec<String> {
    ["cf", "diego", "garden-linux"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn default_redundancy_zone() -> String {
    "windows".to_string()
}

fn default_stack() -> String {
    "windows2012R2".to_string()
}

fn default_consul_domain() -> String {
    "cf.internal".to_string()
}

fn default_script_name() -> String {
    "install.bat".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.director.timeout_secs, 10);
        assert_eq!(config.director.client_id, "bosh_cli");
        assert_eq!(
            config.selection.required_releases,
            vec!["cf", "diego", "garden-linux"]
        );
        assert_eq!(config.installer.redundancy_zone, "windows");
        assert_eq!(config.installer.consul_domain, "cf.internal");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_releases() {
        let mut config = Config::default();
        config.selection.required_releases.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_script_name_with_separator() {
        let mut config = Config::default();
        config.installer.script_name = "../install.bat".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
            [director]
            timeout_secs = 30

            [installer]
            redundancy_zone = "z2"

            [logging]
            level = "debug"
        "#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.director.timeout_secs, 30);
        assert_eq!(config.director.scope, "bosh.read");
        assert_eq!(config.installer.redundancy_zone, "z2");
        assert_eq!(config.installer.stack, "windows2012R2");
        assert_eq!(config.selection.required_releases.len(), 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp_dir = tempdir().unwrap();
        let config = Config::load_or_default(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.installer.script_name, "install.bat");
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/generate.toml").unwrap_err();
        assert!(matches!(err, GenerateError::ConfigNotFound { .. }));
    }
}
