//! Widget configuration loaded from a TOML file
//!
//! Everything here is fixed at startup: the storage key, the follow-up
//! header the assistant is prompted to emit, and the launcher's route and
//! scroll gates.
//!
//! ```toml
//! [chat]
//! storage_key = "folio-chat-history"
//! follow_up_header = "**Want to learn more?**"
//!
//! [visibility]
//! landing_route = "/"
//! landing_threshold = 600.0
//! default_threshold = 10.0
//! hidden_prefixes = ["/docs/internal", "/admin"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::render::DEFAULT_FOLLOW_UP_HEADER;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub visibility: VisibilityConfig,
}

impl WidgetConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let v = &self.visibility;
        if !v.landing_threshold.is_finite() || v.landing_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "visibility.landing_threshold must be a non-negative number".into(),
            ));
        }
        if !v.default_threshold.is_finite() || v.default_threshold < 0.0 {
            return Err(ConfigError::Validation(
                "visibility.default_threshold must be a non-negative number".into(),
            ));
        }
        if self.chat.storage_key.trim().is_empty() {
            return Err(ConfigError::Validation("chat.storage_key must not be empty".into()));
        }
        Ok(self)
    }
}

impl std::str::FromStr for WidgetConfig {
    type Err = ConfigError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: WidgetConfig = toml::from_str(content)?;
        config.validate()
    }
}

/// Chat transcript and reply settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Key under which the transcript is stored
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Header line that introduces follow-up suggestions in a reply
    #[serde(default = "default_follow_up_header")]
    pub follow_up_header: String,
}

fn default_storage_key() -> String {
    "folio-chat-history".to_string()
}

fn default_follow_up_header() -> String {
    DEFAULT_FOLLOW_UP_HEADER.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            follow_up_header: default_follow_up_header(),
        }
    }
}

/// Launcher route and scroll gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    #[serde(default = "default_landing_route")]
    pub landing_route: String,

    /// Scroll offset (px) past the landing page hero
    #[serde(default = "default_landing_threshold")]
    pub landing_threshold: f64,

    /// Scroll offset (px) on every other route
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Path prefixes where the launcher never shows
    #[serde(default = "default_hidden_prefixes")]
    pub hidden_prefixes: Vec<String>,
}

fn default_landing_route() -> String {
    "/".to_string()
}

fn default_landing_threshold() -> f64 {
    600.0
}

fn default_threshold() -> f64 {
    10.0
}

fn default_hidden_prefixes() -> Vec<String> {
    vec!["/docs/internal".to_string(), "/admin".to_string()]
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            landing_route: default_landing_route(),
            landing_threshold: default_landing_threshold(),
            default_threshold: default_threshold(),
            hidden_prefixes: default_hidden_prefixes(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
