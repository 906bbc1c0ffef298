//! Registry of active streaming sessions.
//!
//! The identity -> session map is the only structure shared across
//! connections. It is owned by this service and mutated under one async
//! mutex; holding the lock across teardown is what guarantees that at most
//! one session ever exists per connection identity, even under concurrent
//! start and stop requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audio;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::server::events::ServerEvent;
use crate::session::streaming::{SessionId, StreamingSession};
use crate::speech::SpeechRecognizer;

/// Opaque connection identity, assigned when the transport accepts a
/// connection and threaded explicitly through all calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrency-safe mapping from connection identity to at most one live
/// streaming session.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Arc<StreamingSession>>>,
    recognizer: Arc<dyn SpeechRecognizer>,
    config: Config,
}

impl SessionRegistry {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: Config) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            recognizer,
            config,
        }
    }

    /// Start a session for a connection, replacing any existing one.
    ///
    /// An existing session is stopped synchronously, with the map lock held,
    /// before the replacement is inserted: its worker is fully terminated
    /// before the new session can start one.
    pub async fn start_session(
        &self,
        conn_id: ConnectionId,
        language: &str,
        format: &str,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<SessionId> {
        if !audio::is_supported_language(language) {
            return Err(AppError::Validation(format!(
                "unsupported language code: {}",
                language
            )));
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.remove(&conn_id) {
            warn!(conn_id = %conn_id, "replacing existing session");
            existing.stop().await;
        }

        let session = Arc::new(StreamingSession::new(
            self.recognizer.clone(),
            &self.config,
            language,
            format,
            outbound,
        ));
        let session_id = session.id();
        sessions.insert(conn_id, session);

        info!(conn_id = %conn_id, session_id = %session_id, language, "session started");
        Ok(session_id)
    }

    /// Whether a session exists for this connection identity.
    pub async fn has_session(&self, conn_id: ConnectionId) -> bool {
        self.sessions.lock().await.contains_key(&conn_id)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Feed one audio chunk to the connection's session.
    ///
    /// The map lock is released before awaiting the hand-off, so one
    /// backpressured connection cannot stall the others.
    pub async fn feed_audio(&self, conn_id: ConnectionId, chunk: Bytes) -> Result<()> {
        let session = self
            .sessions
            .lock()
            .await
            .get(&conn_id)
            .cloned()
            .ok_or(AppError::NoSession(conn_id))?;

        session.feed_audio(chunk).await
    }

    /// Stop the connection's session. Idempotent; a missing session is a
    /// no-op. On return the session's worker has terminated and its channel
    /// is released.
    pub async fn stop_session(&self, conn_id: ConnectionId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.remove(&conn_id) {
            session.stop().await;
            info!(conn_id = %conn_id, session_id = %session.id(), "session stopped");
        }
    }

    /// Stop every session. Used on process shutdown.
    pub async fn stop_all(&self) {
        let drained: Vec<_> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().collect()
        };

        for (conn_id, session) in drained {
            session.stop().await;
            info!(conn_id = %conn_id, "session stopped during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::testing::FakeRecognizer;
    use std::time::Duration;

    fn registry_with(recognizer: Arc<FakeRecognizer>) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(recognizer, Config::default()))
    }

    fn outbound() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(64)
    }

    #[tokio::test]
    async fn feed_without_session_fails_with_no_session() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();

        let err = registry
            .feed_audio(conn_id, Bytes::from_static(b"audio"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoSession(id) if id == conn_id));
        assert!(!registry.has_session(conn_id).await);
        assert_eq!(recognizer.calls(), 0, "no side effects");
        assert!(recognizer.chunks().is_empty());
    }

    #[tokio::test]
    async fn chunks_reach_recognizer_in_feed_order() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();
        let (tx, _rx) = outbound();

        registry
            .start_session(conn_id, "en-US", "audio/webm", tx)
            .await
            .unwrap();
        for chunk in [&b"c1"[..], &b"c2"[..], &b"c3"[..]] {
            registry
                .feed_audio(conn_id, Bytes::from_static(chunk))
                .await
                .unwrap();
        }
        registry.stop_session(conn_id).await;

        let chunks = recognizer.wait_for_chunks(3, Duration::from_secs(1));
        assert_eq!(chunks, vec![&b"c1"[..], &b"c2"[..], &b"c3"[..]]);
    }

    #[tokio::test]
    async fn stop_releases_session_immediately() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();
        let (tx, _rx) = outbound();

        registry
            .start_session(conn_id, "ko-KR", "audio/webm", tx)
            .await
            .unwrap();
        registry
            .feed_audio(conn_id, Bytes::from_static(b"audio"))
            .await
            .unwrap();

        registry.stop_session(conn_id).await;
        assert!(!registry.has_session(conn_id).await);
        assert_eq!(recognizer.active(), 0, "worker terminated before return");
    }

    #[tokio::test]
    async fn double_stop_is_a_no_op() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();
        let (tx, _rx) = outbound();

        registry
            .start_session(conn_id, "en-US", "audio/webm", tx)
            .await
            .unwrap();
        registry
            .feed_audio(conn_id, Bytes::from_static(b"audio"))
            .await
            .unwrap();

        registry.stop_session(conn_id).await;
        registry.stop_session(conn_id).await;

        assert!(!registry.has_session(conn_id).await);
        assert_eq!(recognizer.active(), 0);
    }

    #[tokio::test]
    async fn concurrent_stops_perform_one_teardown() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();
        let (tx, _rx) = outbound();

        registry
            .start_session(conn_id, "en-US", "audio/webm", tx)
            .await
            .unwrap();
        registry
            .feed_audio(conn_id, Bytes::from_static(b"audio"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.stop_session(conn_id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(!registry.has_session(conn_id).await);
        assert_eq!(recognizer.active(), 0);
        assert_eq!(recognizer.calls(), 1);
    }

    #[tokio::test]
    async fn replacement_tears_down_old_worker_first() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();

        let (tx1, _rx1) = outbound();
        registry
            .start_session(conn_id, "en-US", "audio/webm", tx1)
            .await
            .unwrap();
        registry
            .feed_audio(conn_id, Bytes::from_static(b"old"))
            .await
            .unwrap();

        let (tx2, _rx2) = outbound();
        registry
            .start_session(conn_id, "en-US", "audio/webm", tx2)
            .await
            .unwrap();
        registry
            .feed_audio(conn_id, Bytes::from_static(b"new"))
            .await
            .unwrap();

        assert_eq!(recognizer.calls(), 2);
        assert_eq!(
            recognizer.max_active(),
            1,
            "old worker fully terminated before the new one began"
        );

        registry.stop_session(conn_id).await;
    }

    #[tokio::test]
    async fn concurrent_starts_leave_exactly_one_session() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());
        let conn_id = ConnectionId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let (tx, rx) = outbound();
            handles.push(tokio::spawn(async move {
                let result = registry
                    .start_session(conn_id, "en-US", "audio/webm", tx)
                    .await;
                // Keep the receiver alive until the start resolves.
                drop(rx);
                result
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(registry.has_session(conn_id).await);
        assert_eq!(registry.session_count().await, 1);

        registry.stop_all().await;
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_unsupported_language() {
        let recognizer = Arc::new(FakeRecognizer::new());
        let registry = registry_with(recognizer);
        let (tx, _rx) = outbound();

        let err = registry
            .start_session(ConnectionId::new(), "xx-XX", "audio/webm", tx)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn stop_all_stops_every_session() {
        let recognizer = Arc::new(FakeRecognizer::new().hold_open());
        let registry = registry_with(recognizer.clone());

        let mut conns = Vec::new();
        for _ in 0..3 {
            let conn_id = ConnectionId::new();
            let (tx, _rx) = outbound();
            registry
                .start_session(conn_id, "en-US", "audio/webm", tx)
                .await
                .unwrap();
            registry
                .feed_audio(conn_id, Bytes::from_static(b"audio"))
                .await
                .unwrap();
            conns.push(conn_id);
        }

        registry.stop_all().await;

        assert_eq!(registry.session_count().await, 0);
        assert_eq!(recognizer.active(), 0);
        for conn_id in conns {
            assert!(!registry.has_session(conn_id).await);
        }
    }
}
