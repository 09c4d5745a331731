//! Conversation types and state management

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Whether a send may start, and what banner the widget shows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum PendingState {
    #[default]
    Idle,
    Sending,
    Error(String),
}

impl PendingState {
    pub fn is_sending(&self) -> bool {
        matches!(self, PendingState::Sending)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            PendingState::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello"}"#);
    }

    #[test]
    fn test_pending_state_shape() {
        let json = serde_json::to_value(PendingState::Error("offline".into())).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "offline");

        let idle = serde_json::to_value(PendingState::Idle).unwrap();
        assert_eq!(idle["state"], "idle");
    }
}
