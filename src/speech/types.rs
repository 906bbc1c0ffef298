//! Domain types for the speech recognition seam.

use serde::{Deserialize, Serialize};

use crate::audio::{self, AudioEncoding};
use crate::config::Config;

/// Recognizer configuration fixed at session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerSettings {
    /// Audio encoding of the incoming frames
    pub encoding: AudioEncoding,

    /// Sample rate of the incoming audio
    pub sample_rate_hertz: u32,

    /// Recognition locale, immutable for the session's lifetime
    pub language_code: String,

    /// Whether the recognizer should insert punctuation
    pub enable_automatic_punctuation: bool,

    /// Whether interim (non-final) results should be produced
    pub interim_results: bool,

    /// Recognition model name
    pub model: String,
}

impl RecognizerSettings {
    /// Build the settings for a session from the server configuration, the
    /// requested locale, and the MIME type of the incoming audio.
    pub fn from_config(config: &Config, language_code: &str, format: &str) -> Self {
        Self {
            encoding: audio::encoding_for_format(format),
            sample_rate_hertz: config.sample_rate_hertz,
            language_code: language_code.to_string(),
            enable_automatic_punctuation: config.enable_automatic_punctuation,
            interim_results: config.interim_results,
            model: config.recognition_model.clone(),
        }
    }
}

/// One recognition event produced by the recognizer.
///
/// Interim results may be superseded by a later final result for the same
/// utterance; consumers relay them as-is, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Best-alternative transcript for the utterance segment
    pub transcript: String,

    /// Recognizer confidence in the transcript
    pub confidence: f32,

    /// Whether this is the terminal result for the segment
    pub is_final: bool,
}
