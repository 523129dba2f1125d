// File config adapter - Loads AppConfig from TOML or YAML files

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{AppConfig, DEFAULT_CONFIG_FILE};
use crate::error::{ReconError, ReconResult};
use crate::utils::path::PathUtils;

/// Loads configuration files, choosing the format by extension
pub struct FileConfigAdapter;

impl FileConfigAdapter {
    /// Load `explicit` if given, else `facerebuild.toml` from the working
    /// directory if present, else defaults.
    ///
    /// An explicitly named file that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> ReconResult<AppConfig> {
        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ReconError::ConfigError {
                        message: format!("Config file does not exist: {}", path.display()),
                    });
                }
                path.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    debug!("No config file found, using defaults");
                    return Ok(AppConfig::default());
                }
                default
            }
        };

        info!("Loading configuration from: {}", path.display());
        let config = Self::load_file(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse one file
    pub fn load_file(path: &Path) -> ReconResult<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| ReconError::ConfigError {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        match PathUtils::extension(path).as_deref() {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content),
            _ => Self::parse_toml(&content),
        }
    }

    pub fn parse_toml(content: &str) -> ReconResult<AppConfig> {
        toml::from_str(content).map_err(|e| ReconError::ConfigError {
            message: format!("Failed to parse TOML config: {}", e),
        })
    }

    pub fn parse_yaml(content: &str) -> ReconResult<AppConfig> {
        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(content).map_err(|e| ReconError::ConfigError {
            message: format!("Failed to parse YAML config: {}", e),
        })
    }

    /// Render a config as TOML
    pub fn to_toml(config: &AppConfig) -> ReconResult<String> {
        toml::to_string_pretty(config).map_err(|e| ReconError::ConfigError {
            message: format!("Failed to serialize config: {}", e),
        })
    }
}
