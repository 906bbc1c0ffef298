//! Per-connection streaming session state machine.
//!
//! A session composes one audio channel and one recognition worker, and owns
//! the relay of recognition events back to its connection. Lifecycle:
//! `Idle` on creation, `Streaming` once the first chunk starts the worker,
//! `Stopping` on stop request, transport failure, or recognition error, and
//! `Closed` once the worker and relay have fully terminated. `Closed` is
//! terminal.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::streaming::WORKER_POLL_TIMEOUT;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::server::events::ServerEvent;
use crate::session::bridge::{BridgeEvent, RecognitionBridge};
use crate::session::channel::{audio_channel, AudioSender, BackpressurePolicy};
use crate::speech::{RecognizerSettings, SpeechRecognizer};

/// Opaque session identity, reported to the client when streaming starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no worker yet.
    Idle,
    /// Worker running, accepting chunks.
    Streaming,
    /// Teardown requested; writes are rejected.
    Stopping,
    /// Terminal; resources released.
    Closed,
}

/// State shared between the session handle, its relay task, and teardown.
struct Inner {
    state: SessionState,
    audio_tx: Option<AudioSender>,
    worker: Option<JoinHandle<()>>,
    relay: Option<JoinHandle<()>>,
}

struct Shared {
    inner: Mutex<Inner>,
    cancel: CancellationToken,
}

impl Shared {
    /// Move into `Stopping` and close the feed so the worker winds down.
    /// Used by the relay on recognition/transport failure; the join itself
    /// happens in `stop`.
    fn begin_stopping(&self) {
        {
            let mut inner = self.inner.lock();
            if matches!(inner.state, SessionState::Idle | SessionState::Streaming) {
                inner.state = SessionState::Stopping;
            }
            inner.audio_tx = None;
        }
        self.cancel.cancel();
    }
}

/// One per-connection streaming session.
pub struct StreamingSession {
    id: SessionId,
    language: String,
    settings: RecognizerSettings,
    recognizer: Arc<dyn SpeechRecognizer>,
    outbound: mpsc::Sender<ServerEvent>,
    channel_capacity: usize,
    backpressure: BackpressurePolicy,
    shared: Arc<Shared>,
    teardown: tokio::sync::Mutex<()>,
}

impl StreamingSession {
    /// Create an idle session. The recognition worker starts lazily on the
    /// first audio chunk.
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        config: &Config,
        language: &str,
        format: &str,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            language: language.to_string(),
            settings: RecognizerSettings::from_config(config, language, format),
            recognizer,
            outbound,
            channel_capacity: config.audio_channel_capacity,
            backpressure: config.backpressure,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::Idle,
                    audio_tx: None,
                    worker: None,
                    relay: None,
                }),
                cancel: CancellationToken::new(),
            }),
            teardown: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Recognition locale, fixed at creation.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Enqueue one audio chunk.
    ///
    /// The first chunk starts the recognition worker. Once the session is
    /// `Stopping` or `Closed`, writes fail with a typed error instead of
    /// being silently dropped.
    pub async fn feed_audio(&self, chunk: Bytes) -> Result<()> {
        let sender = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                SessionState::Stopping | SessionState::Closed => {
                    return Err(AppError::SessionStopping)
                }
                SessionState::Idle => {
                    self.start_worker(&mut inner);
                    inner.state = SessionState::Streaming;
                }
                SessionState::Streaming => {}
            }
            inner
                .audio_tx
                .as_ref()
                .cloned()
                .ok_or(AppError::SessionStopping)?
        };

        sender.send(chunk).await
    }

    /// Spawn the recognition worker and the event relay. Called exactly once,
    /// under the state lock, on the `Idle -> Streaming` transition.
    fn start_worker(&self, inner: &mut Inner) {
        let (audio_tx, audio_rx) = audio_channel(self.channel_capacity, self.backpressure);
        let (events_tx, events_rx) = mpsc::channel(self.channel_capacity);

        let bridge = RecognitionBridge::new(
            self.recognizer.clone(),
            self.settings.clone(),
            WORKER_POLL_TIMEOUT,
        );
        let cancel = self.shared.cancel.clone();
        let worker =
            tokio::task::spawn_blocking(move || bridge.run(audio_rx, cancel, events_tx));

        let relay = tokio::spawn(relay_events(
            events_rx,
            self.outbound.clone(),
            self.language.clone(),
            self.shared.clone(),
        ));

        inner.audio_tx = Some(audio_tx);
        inner.worker = Some(worker);
        inner.relay = Some(relay);

        info!(session_id = %self.id, language = %self.language, "recognition worker started");
    }

    /// Stop the session and release its resources.
    ///
    /// Idempotent and safe to call concurrently: the first caller performs
    /// the teardown, later callers wait for it and return. On return the
    /// channel is released, the worker has terminated, and the state is
    /// `Closed`.
    pub async fn stop(&self) {
        let _guard = self.teardown.lock().await;

        let (worker, relay) = {
            let mut inner = self.shared.inner.lock();
            if inner.state == SessionState::Closed {
                return;
            }
            inner.state = SessionState::Stopping;
            inner.audio_tx = None;
            (inner.worker.take(), inner.relay.take())
        };
        self.shared.cancel.cancel();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(session_id = %self.id, error = %e, "recognition worker panicked");
            }
        }
        // The worker owned the relay's sender; once it has terminated the
        // relay drains whatever is in flight and ends.
        if let Some(relay) = relay {
            if let Err(e) = relay.await {
                error!(session_id = %self.id, error = %e, "event relay panicked");
            }
        }

        self.shared.inner.lock().state = SessionState::Closed;
        debug!(session_id = %self.id, "session closed");
    }
}

/// Forward bridge events to the connection's outbound queue.
///
/// Runs on the primary context so transport sends for one connection stay
/// serialized. A recognition error is relayed as a `streaming_error` event
/// and flips the session to `Stopping`; a dropped outbound queue (the
/// transport went away) does the same without emitting anything.
async fn relay_events(
    mut events: mpsc::Receiver<BridgeEvent>,
    outbound: mpsc::Sender<ServerEvent>,
    language: String,
    shared: Arc<Shared>,
) {
    while let Some(event) = events.recv().await {
        let (event, is_error) = match event {
            BridgeEvent::Transcript(result) => {
                (ServerEvent::transcription(&result, &language), false)
            }
            BridgeEvent::Error(message) => (ServerEvent::streaming_error(&message), true),
        };

        if outbound.send(event).await.is_err() {
            debug!("outbound queue closed, stopping session");
            shared.begin_stopping();
            break;
        }

        if is_error {
            shared.begin_stopping();
            break;
        }
    }
}
