//! Per-tab widget sessions
//!
//! Each browser tab gets its own [`WidgetSession`] with its own tab-scoped
//! storage. Sessions that go quiet for longer than the TTL are dropped along
//! with their storage, which is how a tab's history ends when the tab does.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::WidgetConfig;
use crate::providers::ChatBackend;

use super::dispatcher::{ChatSession, SendOutcome};
use super::store::MemorySessionStorage;
use super::visibility::VisibilityController;

pub struct WidgetSession {
    pub chat: ChatSession,
    pub visibility: VisibilityController,
    last_seen: DateTime<Utc>,
}

impl WidgetSession {
    fn new(config: &WidgetConfig, now: DateTime<Utc>) -> Self {
        let storage = Arc::new(MemorySessionStorage::new());
        Self {
            chat: ChatSession::new(storage, &config.chat),
            visibility: VisibilityController::new(config.visibility.clone()),
            last_seen: now,
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }
}

pub type SharedSession = Arc<Mutex<WidgetSession>>;

pub struct SessionHub {
    sessions: RwLock<HashMap<Uuid, SharedSession>>,
    config: WidgetConfig,
    backend: Arc<dyn ChatBackend>,
    ttl: chrono::Duration,
}

impl SessionHub {
    pub fn new(config: WidgetConfig, backend: Arc<dyn ChatBackend>, ttl: chrono::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            backend,
            ttl,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub async fn create(&self) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(WidgetSession::new(&self.config, Utc::now())));
        self.sessions.write().await.insert(id, session.clone());
        tracing::info!("Created widget session {}", id);
        (id, session)
    }

    /// Look up a session and mark it as active.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.lock().await.last_seen = Utc::now();
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!("Removed widget session {}", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Send `text`, or the session's draft when `text` is `None`.
    ///
    /// The session lock is released while the backend call is in flight, so
    /// reads of the session stay responsive and a second send is ignored.
    pub async fn dispatch(&self, id: Uuid, text: Option<&str>) -> Option<SendOutcome> {
        let session = self.get(id).await?;

        let pending = {
            let mut session = session.lock().await;
            let text = match text {
                Some(text) => text.to_string(),
                None => session.chat.draft().to_string(),
            };
            session.chat.begin_send(&text)
        };

        let Some(pending) = pending else {
            return Some(SendOutcome::Ignored);
        };

        tracing::debug!("Session {} dispatching turn", id);
        let result = self.backend.reply(&pending.request).await;

        let mut session = session.lock().await;
        session.last_seen = Utc::now();
        Some(session.chat.complete_send(pending, result))
    }

    /// Drop sessions idle since before `now - ttl`.
    ///
    /// Sessions that are locked or have a send in flight are kept regardless
    /// of age.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, session| match session.try_lock() {
            Ok(session) => session.chat.pending().is_sending() || session.last_seen >= cutoff,
            Err(_) => true,
        });

        let expired = before - sessions.len();
        if expired > 0 {
            tracing::info!("Expired {} idle widget session(s)", expired);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Message, PendingState};
    use crate::core::dispatcher::tests::ScriptedBackend;
    use crate::providers::{ChatRequest, ProviderError};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    fn hub(backend: Arc<dyn ChatBackend>) -> SessionHub {
        SessionHub::new(WidgetConfig::default(), backend, chrono::Duration::minutes(30))
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let hub = hub(Arc::new(ScriptedBackend::new(vec![])));
        let (id, _) = hub.create().await;

        assert!(hub.get(id).await.is_some());
        assert!(hub.get(Uuid::new_v4()).await.is_none());
        assert!(hub.remove(id).await);
        assert!(!hub.remove(id).await);
        assert_eq!(hub.len().await, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("Hi!".into())]));
        let hub = hub(backend);
        let (a, _) = hub.create().await;
        let (b, session_b) = hub.create().await;

        assert_eq!(hub.dispatch(a, Some("Hello")).await, Some(SendOutcome::Replied));
        assert!(session_b.lock().await.chat.messages().is_empty());
        assert_eq!(hub.dispatch(b, Some("   ")).await, Some(SendOutcome::Ignored));
    }

    #[tokio::test]
    async fn test_dispatch_draft() {
        let hub = hub(Arc::new(ScriptedBackend::new(vec![Ok("Hi!".into())])));
        let (id, session) = hub.create().await;
        session.lock().await.chat.set_draft("Hello");

        assert_eq!(hub.dispatch(id, None).await, Some(SendOutcome::Replied));

        let session = session.lock().await;
        assert_eq!(session.chat.draft(), "");
        assert_eq!(
            session.chat.messages(),
            &[Message::user("Hello"), Message::assistant("Hi!")]
        );
    }

    #[tokio::test]
    async fn test_dispatch_unknown_session() {
        let hub = hub(Arc::new(ScriptedBackend::new(vec![])));
        assert_eq!(hub.dispatch(Uuid::new_v4(), Some("hi")).await, None);
    }

    /// Holds every call until released.
    struct GatedBackend {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ChatBackend for GatedBackend {
        async fn reply(&self, _request: &ChatRequest) -> Result<String, ProviderError> {
            self.entered.notify_one();
            self.release.notified().await;
            Err(ProviderError::Application("offline".into()))
        }
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_is_single_flight() {
        let backend = Arc::new(GatedBackend {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let hub = Arc::new(hub(backend.clone()));
        let (id, session) = hub.create().await;

        let first = tokio::spawn({
            let hub = hub.clone();
            async move { hub.dispatch(id, Some("Hello")).await }
        });
        backend.entered.notified().await;

        // The session is readable and shows the optimistic turn while in flight.
        {
            let session = session.lock().await;
            assert!(session.chat.pending().is_sending());
            assert_eq!(session.chat.messages().len(), 1);
        }

        assert_eq!(hub.dispatch(id, Some("Again")).await, Some(SendOutcome::Ignored));

        backend.release.notify_one();
        assert_eq!(first.await.unwrap(), Some(SendOutcome::Failed));

        let session = session.lock().await;
        assert!(session.chat.messages().is_empty());
        assert_eq!(session.chat.pending(), &PendingState::Error("offline".into()));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let hub = hub(Arc::new(ScriptedBackend::new(vec![])));
        let (stale, _) = hub.create().await;
        let (_fresh, _) = hub.create().await;

        hub.sessions.read().await[&stale].lock().await.last_seen =
            Utc::now() - chrono::Duration::hours(2);

        assert_eq!(hub.sweep_expired(Utc::now()).await, 1);
        assert!(hub.get(stale).await.is_none());
        assert_eq!(hub.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_session_with_send_in_flight() {
        let backend = Arc::new(GatedBackend {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let hub = Arc::new(hub(backend.clone()));
        let (id, session) = hub.create().await;

        let send = tokio::spawn({
            let hub = hub.clone();
            async move { hub.dispatch(id, Some("Hello")).await }
        });
        backend.entered.notified().await;

        session.lock().await.last_seen = Utc::now() - chrono::Duration::hours(2);
        assert_eq!(hub.sweep_expired(Utc::now()).await, 0);

        backend.release.notify_one();
        assert_eq!(send.await.unwrap(), Some(SendOutcome::Failed));
        assert!(hub.get(id).await.is_some());
    }
}
