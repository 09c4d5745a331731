//! Remote chat backends

mod ollama;
mod remote;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::conversation::Message;

pub use ollama::OllamaBackend;
pub use remote::RemoteEndpoint;

/// Fallback banner text when the backend gives no usable reason.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    Application(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Text for the widget's error banner. Never empty.
    pub fn banner_text(&self) -> String {
        let text = match self {
            ProviderError::Status { message, .. } | ProviderError::Application(message) => {
                message.trim().to_string()
            }
            ProviderError::RequestFailed(_) => {
                "Couldn't reach the assistant. Check your connection and try again.".to_string()
            }
            _ => String::new(),
        };

        if text.is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            text
        }
    }
}

/// One outbound turn: the new message plus the transcript before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Message>,
}

/// A collaborator that answers one user turn.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

pub enum Provider {
    Remote(RemoteEndpoint),
    Ollama(OllamaBackend),
}

impl Provider {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let timeout = config.request_timeout();

        match config.provider.to_lowercase().as_str() {
            "remote" => {
                let url = config
                    .endpoint_url
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured("CHAT_ENDPOINT_URL".into()))?;
                Ok(Provider::Remote(RemoteEndpoint::new(url, timeout)?))
            }
            "ollama" => {
                let url = config
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".into());
                Ok(Provider::Ollama(OllamaBackend::new(
                    url,
                    config.ollama_model.clone(),
                    timeout,
                )?))
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Remote(_) => "remote",
            Provider::Ollama(_) => "ollama",
        }
    }
}

#[async_trait]
impl ChatBackend for Provider {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        match self {
            Provider::Remote(p) => p.reply(request).await,
            Provider::Ollama(p) => p.reply(request).await,
        }
    }
}

/// Build a reqwest client, with a timeout only when one is configured.
fn http_client(timeout: Option<std::time::Duration>) -> Result<reqwest::Client, ProviderError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> Config {
        Config {
            provider: provider.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_from_config() {
        let mut remote = config("remote");
        assert!(matches!(
            Provider::from_config(&remote),
            Err(ProviderError::NotConfigured(_))
        ));

        remote.endpoint_url = Some("https://example.com/api/chat".into());
        assert_eq!(Provider::from_config(&remote).unwrap().name(), "remote");

        assert_eq!(Provider::from_config(&config("Ollama")).unwrap().name(), "ollama");

        assert!(matches!(
            Provider::from_config(&config("carrier-pigeon")),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_banner_text_never_empty() {
        let errors = [
            ProviderError::Application("Rate limit reached".into()),
            ProviderError::Application("   ".into()),
            ProviderError::Status {
                status: 502,
                message: String::new(),
            },
            ProviderError::InvalidResponse("no response field".into()),
        ];

        assert_eq!(errors[0].banner_text(), "Rate limit reached");
        for error in &errors[1..] {
            assert_eq!(error.banner_text(), GENERIC_FAILURE);
        }
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            message: "Hello".into(),
            history: vec![Message::user("Hi"), Message::assistant("Hey")],
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["message"], "Hello");
        assert_eq!(json["history"][1]["role"], "assistant");
        assert_eq!(json["history"][1]["content"], "Hey");
    }
}
