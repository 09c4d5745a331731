//! Hosted chat endpoint
//!
//! The site's assistant lives behind a single JSON endpoint:
//!
//! ```text
//! POST {endpoint}
//! { "message": "...", "history": [{ "role": "user", "content": "..." }] }
//!
//! 200 { "response": "..." }      reply
//! 200 { "error": "..." }         application-level failure
//! 4xx/5xx { "error": "..." }     transport-level failure
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{http_client, ChatBackend, ChatRequest, ProviderError};

#[derive(Debug, Default, Deserialize)]
struct EndpointResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct RemoteEndpoint {
    client: Client,
    url: String,
}

impl RemoteEndpoint {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ChatBackend for RemoteEndpoint {
    async fn reply(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        tracing::debug!(
            "POST {} ({} prior turn(s))",
            self.url,
            request.history.len()
        );

        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;

        interpret(status.as_u16(), status.is_success(), &body)
    }
}

/// Map a raw endpoint reply onto a reply text or an error.
fn interpret(status: u16, success: bool, body: &str) -> Result<String, ProviderError> {
    let parsed = serde_json::from_str::<EndpointResponse>(body);

    if !success {
        let message = parsed.ok().and_then(|p| p.error).unwrap_or_default();
        tracing::warn!("Chat endpoint returned HTTP {}: {}", status, body);
        return Err(ProviderError::Status { status, message });
    }

    let parsed = parsed.map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
    })?;

    // An error field wins even on a 2xx status.
    if let Some(error) = parsed.error {
        tracing::warn!("Chat endpoint reported an error: {}", error);
        return Err(ProviderError::Application(error));
    }

    parsed
        .response
        .ok_or_else(|| ProviderError::InvalidResponse("Missing 'response' field".to_string()))
}
