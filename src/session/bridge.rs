//! Recognition bridge: the meeting point of the async and blocking worlds.
//!
//! One bridge runs per session, on the blocking pool. It owns the blocking
//! duplex call: audio is pulled from the session's channel through a
//! pull-style iterator, recognition events are pushed back into the session's
//! async relay queue. The primary scheduling context never waits on the
//! recognizer.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::session::channel::{AudioReceiver, PollOutcome};
use crate::speech::{RecognitionResult, RecognizerSettings, SpeechRecognizer};

/// Event re-entering the async side from the recognition worker.
#[derive(Debug)]
pub enum BridgeEvent {
    /// One interim or final recognition result, in receipt order.
    Transcript(RecognitionResult),

    /// The recognition call failed; the session must stop.
    Error(String),
}

/// Adapts the session's async chunk producer to the recognizer's blocking
/// duplex call.
pub struct RecognitionBridge {
    recognizer: Arc<dyn SpeechRecognizer>,
    settings: RecognizerSettings,
    poll_timeout: Duration,
}

impl RecognitionBridge {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        settings: RecognizerSettings,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            recognizer,
            settings,
            poll_timeout,
        }
    }

    /// Drive the duplex call to completion. Blocks the current thread; must
    /// run on the blocking pool.
    ///
    /// The feed iterator ends when the cancellation token fires or the
    /// session drops its sender half, which half-closes the call and lets the
    /// response stream terminate. Events are forwarded with `blocking_send`
    /// so they re-enter the owning async context in order.
    pub fn run(
        self,
        audio: AudioReceiver,
        cancel: CancellationToken,
        events: mpsc::Sender<BridgeEvent>,
    ) {
        let feed = AudioFeed {
            audio,
            cancel: cancel.clone(),
            poll_timeout: self.poll_timeout,
        };

        let results = match self
            .recognizer
            .streaming_recognize(self.settings, Box::new(feed))
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "failed to open recognition stream");
                let _ = events.blocking_send(BridgeEvent::Error(e.to_string()));
                return;
            }
        };

        for result in results {
            if cancel.is_cancelled() {
                debug!("recognition worker cancelled");
                break;
            }
            match result {
                Ok(event) => {
                    if events.blocking_send(BridgeEvent::Transcript(event)).is_err() {
                        // Relay side is gone; the session is tearing down.
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "recognition stream failed");
                    let _ = events.blocking_send(BridgeEvent::Error(e.to_string()));
                    break;
                }
            }
        }

        debug!("recognition worker finished");
    }
}

/// Pull-style audio iterator handed to the recognizer.
///
/// Polls the channel with a bounded wait so cancellation is observed within
/// one poll interval even when no audio is arriving.
struct AudioFeed {
    audio: AudioReceiver,
    cancel: CancellationToken,
    poll_timeout: Duration,
}

impl Iterator for AudioFeed {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }
            match self.audio.poll_chunk(self.poll_timeout) {
                PollOutcome::Chunk(chunk) => return Some(chunk),
                PollOutcome::Empty => continue,
                PollOutcome::Closed => return None,
            }
        }
    }
}
