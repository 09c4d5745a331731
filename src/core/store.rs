//! Tab-scoped transcript storage
//!
//! The widget keeps its transcript in a key/value store that lives only as
//! long as the browser tab. Every mutation writes the full transcript back
//! under a single key; reads that find nothing usable start from empty.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::conversation::Message;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage quota exceeded: {0} bytes")]
    QuotaExceeded(usize),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A string key/value store scoped to one browser tab.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str);
}

/// In-process session storage, optionally bounded by total bytes.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    items: Arc<RwLock<HashMap<String, String>>>,
    quota: Option<usize>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Arc::default(),
            quota: Some(quota),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        let items = self.items.read().ok()?;
        items.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut items = self
            .items
            .write()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded(needed));
            }
        }

        items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.write() {
            items.remove(key);
        }
    }
}

/// The transcript for one tab, mirrored into [`SessionStorage`] on every change.
pub struct TranscriptStore {
    storage: Arc<dyn SessionStorage>,
    key: String,
    messages: Vec<Message>,
}

impl TranscriptStore {
    /// Load the transcript stored under `key`.
    ///
    /// Missing or malformed data yields an empty transcript.
    pub fn load(storage: Arc<dyn SessionStorage>, key: impl Into<String>) -> Self {
        let key = key.into();
        let messages = match storage.get_item(&key) {
            Some(raw) => serde_json::from_str::<Vec<Message>>(&raw).unwrap_or_else(|e| {
                tracing::debug!("Discarding unreadable transcript under '{}': {}", key, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            storage,
            key,
            messages,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.persist();
    }

    /// Pop the newest message. Only used to roll back a failed dispatch.
    pub fn remove_last(&mut self) -> Option<Message> {
        let removed = self.messages.pop();
        self.persist();
        removed
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.storage.remove_item(&self.key);
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.messages)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set_item(&self.key, json));

        // The in-memory copy stays authoritative when the write is refused.
        if let Err(e) = result {
            tracing::warn!("Failed to persist transcript under '{}': {}", self.key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "folio-chat-history";

    fn storage() -> Arc<MemorySessionStorage> {
        Arc::new(MemorySessionStorage::new())
    }

    #[test]
    fn test_load_absent_is_empty() {
        let store = TranscriptStore::load(storage(), KEY);
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_malformed_is_empty() {
        let storage = storage();
        storage.set_item(KEY, "{not json".to_string()).unwrap();

        let store = TranscriptStore::load(storage.clone(), KEY);
        assert!(store.is_empty());

        storage.set_item(KEY, r#"[{"role":"robot","content":"x"}]"#.to_string()).unwrap();
        let store = TranscriptStore::load(storage, KEY);
        assert!(store.is_empty());
    }

    #[test]
    fn test_every_mutation_persists() {
        let storage = storage();
        let mut store = TranscriptStore::load(storage.clone(), KEY);

        store.append(Message::user("Hello"));
        store.append(Message::assistant("Hi there!"));
        let raw = storage.get_item(KEY).unwrap();
        assert!(raw.contains("Hi there!"));

        store.remove_last();
        let reloaded = TranscriptStore::load(storage.clone(), KEY);
        assert_eq!(reloaded.messages(), &[Message::user("Hello")]);

        store.clear();
        assert!(storage.get_item(KEY).is_none());
    }

    #[test]
    fn test_persistence_idempotence() {
        let storage = storage();
        let mut store = TranscriptStore::load(storage.clone(), KEY);
        store.append(Message::user("What have you built?"));
        store.append(Message::assistant("A few things."));
        store.append(Message::user("Tell me about the **compiler**"));

        let first = TranscriptStore::load(storage.clone(), KEY);
        first.persist();
        let second = TranscriptStore::load(storage, KEY);

        assert_eq!(first.messages(), second.messages());
        assert_eq!(second.messages(), store.messages());
    }

    #[test]
    fn test_quota_failure_keeps_memory_copy() {
        let storage = Arc::new(MemorySessionStorage::with_quota(64));
        let mut store = TranscriptStore::load(storage.clone(), KEY);

        store.append(Message::user("short"));
        store.append(Message::assistant("x".repeat(200)));

        assert_eq!(store.len(), 2);
        let persisted = TranscriptStore::load(storage, KEY);
        assert_eq!(persisted.len(), 1);
    }
}
