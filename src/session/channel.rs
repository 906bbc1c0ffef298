//! Bounded audio hand-off channel.
//!
//! Bridges the asynchronous side of a session (the WebSocket task enqueueing
//! audio frames) to the blocking side (the recognition worker pulling them).
//! A single bounded channel serves both ends: the producer enqueues without
//! ever blocking its thread, the consumer polls with a bounded wait so it can
//! observe cancellation promptly.

use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, RecvTimeoutError, TrySendError};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::streaming::{ENQUEUE_RETRY_INTERVAL, ENQUEUE_TIMEOUT};
use crate::error::{AppError, Result};

/// What to do when audio arrives faster than the recognition worker drains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Wait for channel space up to a bounded timeout, then fail.
    Block,
    /// Fail immediately when the channel is full.
    FailFast,
}

/// Create the bounded hand-off channel for one session.
pub fn audio_channel(capacity: usize, policy: BackpressurePolicy) -> (AudioSender, AudioReceiver) {
    let (tx, rx) = channel::bounded(capacity);
    (
        AudioSender {
            tx,
            capacity,
            policy,
        },
        AudioReceiver { rx },
    )
}

/// Producer half, used from the async side.
#[derive(Debug, Clone)]
pub struct AudioSender {
    tx: channel::Sender<Bytes>,
    capacity: usize,
    policy: BackpressurePolicy,
}

impl AudioSender {
    /// Enqueue one audio chunk.
    ///
    /// Under [`BackpressurePolicy::Block`] a full channel is retried on the
    /// async timer up to the enqueue timeout, so the calling task suspends
    /// instead of blocking its thread. Under [`BackpressurePolicy::FailFast`]
    /// a full channel fails immediately. A closed channel means the consumer
    /// released its end and the session is going away.
    pub async fn send(&self, chunk: Bytes) -> Result<()> {
        let mut pending = chunk;
        let deadline = Instant::now() + ENQUEUE_TIMEOUT;

        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Disconnected(_)) => return Err(AppError::SessionStopping),
                Err(TrySendError::Full(chunk)) => {
                    if self.policy == BackpressurePolicy::FailFast || Instant::now() >= deadline {
                        return Err(AppError::ChannelFull(format!(
                            "{} chunks queued",
                            self.capacity
                        )));
                    }
                    pending = chunk;
                    tokio::time::sleep(ENQUEUE_RETRY_INTERVAL).await;
                }
            }
        }
    }
}

/// Outcome of one bounded poll on the consumer side.
#[derive(Debug)]
pub enum PollOutcome {
    /// A chunk was handed off.
    Chunk(Bytes),
    /// The wait timed out; the caller should re-check cancellation and retry.
    Empty,
    /// The producer half was dropped; no more audio will arrive.
    Closed,
}

/// Consumer half, used from the blocking recognition worker.
#[derive(Debug)]
pub struct AudioReceiver {
    rx: channel::Receiver<Bytes>,
}

impl AudioReceiver {
    /// Wait for the next chunk, at most `timeout`.
    pub fn poll_chunk(&self, timeout: Duration) -> PollOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(chunk) => PollOutcome::Chunk(chunk),
            Err(RecvTimeoutError::Timeout) => PollOutcome::Empty,
            Err(RecvTimeoutError::Disconnected) => PollOutcome::Closed,
        }
    }
}
