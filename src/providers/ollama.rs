//! Ollama backend for local development
//!
//! Skips the hosted endpoint and asks a local Ollama server directly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;

use super::{http_client, ChatBackend, ChatRequest, ProviderError};

pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaBackend {
    pub fn new(
        base_url: String,
        model: String,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url,
            model,
        })
    }

    fn build_request(&self, request: &ChatRequest) -> OllamaRequest {
        let mut messages: Vec<OllamaMessage> =
            request.history.iter().map(OllamaMessage::from).collect();
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: request.message.clone(),
        });

        OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let body = self.build_request(request);

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_default();
            tracing::warn!("Ollama returned HTTP {}: {}", status, body);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let ollama_response: OllamaResponse = response.json().await?;
        if let Some(error) = ollama_response.error {
            return Err(ProviderError::Application(error));
        }

        ollama_response
            .message
            .map(|m| m.content)
            .ok_or_else(|| ProviderError::InvalidResponse("Missing 'message' field".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_appends_new_turn() {
        let backend =
            OllamaBackend::new("http://localhost:11434".into(), "llama3.2".into(), None).unwrap();
        let request = ChatRequest {
            message: "And now?".into(),
            history: vec![Message::user("Hi"), Message::assistant("Hello!")],
        };

        let body = backend.build_request(&request);
        assert_eq!(body.model, "llama3.2");
        assert!(!body.stream);
        assert_eq!(body.messages.len(), 3);
        assert_eq!(body.messages[1].role, "assistant");
        assert_eq!(
            body.messages[2],
            OllamaMessage {
                role: "user".into(),
                content: "And now?".into()
            }
        );
    }
}
