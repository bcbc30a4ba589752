//! Agent configuration (hotswap.toml)
//!
//! ```toml
//! proxy_prefix = "org/hotswap/proxy/AnnotationProxy"
//! class_major_version = 52
//! verify_proxies = true
//! ```

use std::path::Path;

use hotswap_classfile::classfile::MIN_ANNOTATION_MAJOR;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Agent settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Internal-name prefix for synthesized proxies
    #[serde(default = "default_proxy_prefix")]
    pub proxy_prefix: String,

    /// Major version written into proxy definitions
    #[serde(default = "default_class_major_version")]
    pub class_major_version: u16,

    /// Verify each proxy before handing it to a loader
    #[serde(default = "default_verify_proxies")]
    pub verify_proxies: bool,
}

fn default_proxy_prefix() -> String {
    "org/hotswap/proxy/AnnotationProxy".to_string()
}

fn default_class_major_version() -> u16 {
    MIN_ANNOTATION_MAJOR
}

fn default_verify_proxies() -> bool {
    true
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            proxy_prefix: default_proxy_prefix(),
            class_major_version: default_class_major_version(),
            verify_proxies: default_verify_proxies(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.proxy_prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "proxy_prefix cannot be empty".to_string(),
            ));
        }
        // Internal names: slash separated, no empty segments
        if prefix.contains(['.', ';', '[']) || prefix.split('/').any(str::is_empty) {
            return Err(ConfigError::Invalid(format!(
                "proxy_prefix '{}' is not an internal class name",
                prefix
            )));
        }

        if self.class_major_version < MIN_ANNOTATION_MAJOR {
            return Err(ConfigError::Invalid(format!(
                "class_major_version {} predates annotation attributes (minimum {})",
                self.class_major_version, MIN_ANNOTATION_MAJOR
            )));
        }
        Ok(())
    }
}
