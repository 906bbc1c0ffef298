//! The recognizer trait seam.
//!
//! The external engine exposes recognition as blocking calls: a duplex
//! streaming call driven by a pull-style request iterator, and a unary call
//! for single-shot transcription. Implementations are swappable behind this
//! trait; the production implementation speaks gRPC, tests use a scripted
//! fake.

use bytes::Bytes;

use crate::error::Result;
use crate::speech::types::{RecognitionResult, RecognizerSettings};

/// Pull-style sequence of audio frames consumed by the recognizer.
pub type AudioFrames = Box<dyn Iterator<Item = Bytes> + Send>;

/// Blocking sequence of recognition events produced by the recognizer.
pub type RecognitionEvents = Box<dyn Iterator<Item = Result<RecognitionResult>> + Send>;

/// A speech recognition engine.
///
/// Both calls block the current thread and must only run on a dedicated
/// worker, never on the async scheduler.
pub trait SpeechRecognizer: Send + Sync {
    /// Open a duplex recognition call.
    ///
    /// The settings frame is transmitted exactly once, before the first audio
    /// frame. The returned iterator yields interim and final results in the
    /// order the engine emits them and ends when the request side is
    /// exhausted and the engine completes the stream.
    fn streaming_recognize(
        &self,
        settings: RecognizerSettings,
        audio: AudioFrames,
    ) -> Result<RecognitionEvents>;

    /// Recognize a complete audio payload in one shot.
    fn recognize(
        &self,
        settings: RecognizerSettings,
        audio: Bytes,
    ) -> Result<Vec<RecognitionResult>>;
}
