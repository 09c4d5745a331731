//! Application configuration

pub mod widget;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use widget::{ChatConfig, ConfigError, VisibilityConfig, WidgetConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Backend name: "remote" or "ollama"
    pub provider: String,
    pub endpoint_url: Option<String>,
    pub ollama_url: Option<String>,
    pub ollama_model: String,
    pub widget_config: Option<PathBuf>,
    pub session_ttl_minutes: i64,
    /// Client-side timeout for the outbound call; none unless set
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            provider: "remote".into(),
            endpoint_url: None,
            ollama_url: None,
            ollama_model: "llama3.2".into(),
            widget_config: None,
            session_ttl_minutes: 60,
            timeout_secs: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            provider: env::var("CHAT_PROVIDER").unwrap_or(defaults.provider),
            endpoint_url: env::var("CHAT_ENDPOINT_URL").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            widget_config: env::var("WIDGET_CONFIG").ok().map(PathBuf::from),
            session_ttl_minutes: env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|m| m.parse().ok())
                .filter(|m: &i64| *m > 0)
                .unwrap_or(defaults.session_ttl_minutes),
            timeout_secs: env::var("CHAT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|s: &u64| *s > 0),
        })
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.session_ttl_minutes)
    }

    /// Load the widget file if one is configured, otherwise the defaults.
    pub fn load_widget_config(&self) -> Result<WidgetConfig, ConfigError> {
        match &self.widget_config {
            Some(path) => WidgetConfig::from_file(path),
            None => Ok(WidgetConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider, "remote");
        assert!(config.request_timeout().is_none());
        assert_eq!(config.session_ttl(), chrono::Duration::minutes(60));
        assert_eq!(config.load_widget_config().unwrap(), WidgetConfig::default());
    }

    #[test]
    fn test_timeout_opt_in() {
        let config = Config {
            timeout_secs: Some(30),
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }
}
