//! Chat session state and message dispatch
//!
//! A [`ChatSession`] is the single state object behind the widget: the
//! transcript, the pending/error flag, the draft input and the follow-ups
//! from the latest reply. Sending is split in two phases so a shared
//! session does not have to stay locked while the backend is thinking:
//!
//! 1. [`ChatSession::begin_send`] appends the user turn optimistically and
//!    marks the session as sending
//! 2. [`ChatSession::complete_send`] appends the reply, or rolls the user
//!    turn back and raises the error banner

use std::sync::Arc;

use serde::Serialize;

use crate::config::ChatConfig;
use crate::conversation::{Message, PendingState};
use crate::providers::{ChatBackend, ChatRequest, ProviderError};
use crate::render::extract_follow_ups_with;

use super::store::{SessionStorage, TranscriptStore};

/// How a send attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendOutcome {
    Replied,
    Failed,
    /// Blank text, or another send was already in flight.
    Ignored,
}

/// An accepted send waiting on the backend.
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub request: ChatRequest,
    generation: u64,
}

pub struct ChatSession {
    transcript: TranscriptStore,
    pending: PendingState,
    draft: String,
    follow_ups: Vec<String>,
    follow_up_header: String,
    /// Bumped by `clear` so replies to a wiped transcript are dropped.
    generation: u64,
}

impl ChatSession {
    /// Restore the session from `storage`.
    pub fn new(storage: Arc<dyn SessionStorage>, config: &ChatConfig) -> Self {
        Self {
            transcript: TranscriptStore::load(storage, config.storage_key.clone()),
            pending: PendingState::Idle,
            draft: String::new(),
            follow_ups: Vec::new(),
            follow_up_header: config.follow_up_header.clone(),
            generation: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn pending(&self) -> &PendingState {
        &self.pending
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn follow_ups(&self) -> &[String] {
        &self.follow_ups
    }

    pub fn follow_up_header(&self) -> &str {
        &self.follow_up_header
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Hide the error banner.
    pub fn dismiss_error(&mut self) {
        if matches!(self.pending, PendingState::Error(_)) {
            self.pending = PendingState::Idle;
        }
    }

    /// Wipe the transcript and its persisted copy.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.follow_ups.clear();
        self.generation += 1;
        if !self.pending.is_sending() {
            self.pending = PendingState::Idle;
        }
    }

    /// Start a send. Returns `None` when `text` is blank or a send is in flight.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.pending.is_sending() {
            tracing::debug!("Ignoring send while another is in flight");
            return None;
        }

        let request = ChatRequest {
            message: text.to_string(),
            history: self.transcript.messages().to_vec(),
        };

        self.draft.clear();
        self.transcript.append(Message::user(text));
        self.pending = PendingState::Sending;

        Some(PendingSend {
            request,
            generation: self.generation,
        })
    }

    /// Apply the backend result for `pending`.
    pub fn complete_send(
        &mut self,
        pending: PendingSend,
        result: Result<String, ProviderError>,
    ) -> SendOutcome {
        if pending.generation != self.generation {
            tracing::debug!("Dropping reply for a cleared transcript");
            self.pending = PendingState::Idle;
            return SendOutcome::Ignored;
        }

        match result {
            Ok(text) => {
                let reply = extract_follow_ups_with(&text, &self.follow_up_header);
                self.transcript.append(Message::assistant(reply.main));
                self.follow_ups = reply.follow_ups;
                self.pending = PendingState::Idle;
                SendOutcome::Replied
            }
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                self.rollback(&pending.request.message);
                self.pending = PendingState::Error(e.banner_text());
                SendOutcome::Failed
            }
        }
    }

    /// Send `text` and wait for the reply.
    pub async fn send(&mut self, backend: &dyn ChatBackend, text: &str) -> SendOutcome {
        let Some(pending) = self.begin_send(text) else {
            return SendOutcome::Ignored;
        };
        let result = backend.reply(&pending.request).await;
        self.complete_send(pending, result)
    }

    /// Send the current draft.
    pub async fn submit(&mut self, backend: &dyn ChatBackend) -> SendOutcome {
        let text = self.draft.clone();
        self.send(backend, &text).await
    }

    fn rollback(&mut self, text: &str) {
        let is_optimistic = self
            .transcript
            .messages()
            .last()
            .is_some_and(|m| *m == Message::user(text));

        if is_optimistic {
            self.transcript.remove_last();
        }
    }
}
