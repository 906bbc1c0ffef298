//! Scripted recognizer double for session and registry tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::vec::IntoIter;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::speech::recognizer::{AudioFrames, RecognitionEvents, SpeechRecognizer};
use crate::speech::types::{RecognitionResult, RecognizerSettings};

type ScriptItem = std::result::Result<RecognitionResult, String>;

/// A recognizer that captures the audio it is fed, in order, and replays a
/// scripted sequence of events.
///
/// Each duplex call spawns a drain thread that consumes the request iterator
/// exactly like a real engine would, so chunk order and feed lifetime are
/// observable. With `hold_open`, the returned event iterator stays open until
/// the feed is exhausted, modelling an engine that keeps the stream alive for
/// the whole session.
pub struct FakeRecognizer {
    script: Vec<ScriptItem>,
    hold_open: bool,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    settings_seen: Arc<Mutex<Vec<RecognizerSettings>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FakeRecognizer {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            hold_open: false,
            chunks: Arc::new(Mutex::new(Vec::new())),
            settings_seen: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replay these events on every duplex call.
    pub fn with_script(script: Vec<ScriptItem>) -> Self {
        Self {
            script,
            ..Self::new()
        }
    }

    /// Keep each duplex call's event stream open until its audio feed ends.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn interim(transcript: &str, confidence: f32) -> ScriptItem {
        Ok(RecognitionResult {
            transcript: transcript.to_string(),
            confidence,
            is_final: false,
        })
    }

    pub fn final_result(transcript: &str, confidence: f32) -> ScriptItem {
        Ok(RecognitionResult {
            transcript: transcript.to_string(),
            confidence,
            is_final: true,
        })
    }

    pub fn failure(message: &str) -> ScriptItem {
        Err(message.to_string())
    }

    /// All chunks received so far, across calls, in feed order.
    pub fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().clone()
    }

    /// Settings frames observed, one per duplex call.
    pub fn settings_seen(&self) -> Vec<RecognizerSettings> {
        self.settings_seen.lock().clone()
    }

    /// Number of duplex calls opened.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Duplex calls currently alive (event stream not yet dropped).
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrently alive duplex calls.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Block until every chunk fed so far has been drained, up to `timeout`.
    pub fn wait_for_chunks(&self, expected: usize, timeout: std::time::Duration) -> Vec<Bytes> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let chunks = self.chunks.lock().clone();
            if chunks.len() >= expected || std::time::Instant::now() >= deadline {
                return chunks;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechRecognizer for FakeRecognizer {
    fn streaming_recognize(
        &self,
        settings: RecognizerSettings,
        audio: AudioFrames,
    ) -> Result<RecognitionEvents> {
        self.settings_seen.lock().push(settings);
        self.calls.fetch_add(1, Ordering::SeqCst);
        let live = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(live, Ordering::SeqCst);

        let (done_tx, done_rx) = std_mpsc::channel();
        let chunks = self.chunks.clone();
        thread::spawn(move || {
            for chunk in audio {
                chunks.lock().push(chunk);
            }
            let _ = done_tx.send(());
        });

        Ok(Box::new(ScriptedEvents {
            items: self.script.clone().into_iter(),
            feed_done: self.hold_open.then_some(done_rx),
            _live: LiveGuard(self.active.clone()),
        }))
    }

    fn recognize(
        &self,
        settings: RecognizerSettings,
        audio: Bytes,
    ) -> Result<Vec<RecognitionResult>> {
        self.settings_seen.lock().push(settings);
        self.chunks.lock().push(audio);
        self.script
            .iter()
            .cloned()
            .map(|item| item.map_err(AppError::Recognition))
            .collect()
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct ScriptedEvents {
    items: IntoIter<ScriptItem>,
    feed_done: Option<std_mpsc::Receiver<()>>,
    _live: LiveGuard,
}

impl Iterator for ScriptedEvents {
    type Item = Result<RecognitionResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(item) = self.items.next() {
            return Some(item.map_err(AppError::Recognition));
        }
        if let Some(done) = self.feed_done.take() {
            let _ = done.recv();
        }
        None
    }
}
