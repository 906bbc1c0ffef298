//! Audio format and locale validation.
//!
//! Maps the MIME types produced by browser capture (MediaRecorder) onto the
//! recognizer's encoding enum and validates requested recognition locales
//! before a session is started.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Audio encodings understood by the recognition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Linear16,
    Flac,
    Mp3,
    OggOpus,
    WebmOpus,
}

/// Supported MIME types, in the order clients most commonly send them.
pub const SUPPORTED_FORMATS: [&str; 5] = [
    "audio/webm",
    "audio/wav",
    "audio/mp3",
    "audio/ogg",
    "audio/flac",
];

/// Check whether a MIME type names a supported audio container.
pub fn is_supported_format(format: &str) -> bool {
    let format = normalize(format);
    SUPPORTED_FORMATS.contains(&format.as_str())
}

/// Map a MIME type to the recognizer encoding.
///
/// Unrecognized formats fall back to WebM/Opus rather than rejecting the
/// session; browsers routinely append codec parameters to the base type.
pub fn encoding_for_format(format: &str) -> AudioEncoding {
    match normalize(format).as_str() {
        "audio/webm" => AudioEncoding::WebmOpus,
        "audio/wav" => AudioEncoding::Linear16,
        "audio/mp3" => AudioEncoding::Mp3,
        "audio/ogg" => AudioEncoding::OggOpus,
        "audio/flac" => AudioEncoding::Flac,
        other => {
            warn!(format = other, "unrecognized audio format, assuming WebM/Opus");
            AudioEncoding::WebmOpus
        }
    }
}

/// Recognition locales this deployment accepts, with display names.
pub const SUPPORTED_LANGUAGES: [(&str, &str); 10] = [
    ("ko-KR", "Korean"),
    ("en-US", "English (US)"),
    ("ja-JP", "Japanese"),
    ("zh-CN", "Chinese (Simplified)"),
    ("es-ES", "Spanish"),
    ("fr-FR", "French"),
    ("de-DE", "German"),
    ("it-IT", "Italian"),
    ("pt-BR", "Portuguese (Brazil)"),
    ("ru-RU", "Russian"),
];

/// Check whether a locale code is supported.
pub fn is_supported_language(language_code: &str) -> bool {
    SUPPORTED_LANGUAGES
        .iter()
        .any(|(code, _)| *code == language_code)
}

/// Strip MIME parameters (e.g. `;codecs=opus`) and lowercase the base type.
fn normalize(format: &str) -> String {
    format
        .split(';')
        .next()
        .unwrap_or(format)
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_supported_formats() {
        assert_eq!(encoding_for_format("audio/webm"), AudioEncoding::WebmOpus);
        assert_eq!(encoding_for_format("audio/wav"), AudioEncoding::Linear16);
        assert_eq!(encoding_for_format("audio/mp3"), AudioEncoding::Mp3);
        assert_eq!(encoding_for_format("audio/ogg"), AudioEncoding::OggOpus);
        assert_eq!(encoding_for_format("audio/flac"), AudioEncoding::Flac);
    }

    #[test]
    fn strips_codec_parameters() {
        assert!(is_supported_format("audio/webm;codecs=opus"));
        assert_eq!(
            encoding_for_format("audio/ogg; codecs=opus"),
            AudioEncoding::OggOpus
        );
    }

    #[test]
    fn unknown_format_falls_back_to_webm_opus() {
        assert!(!is_supported_format("audio/aac"));
        assert_eq!(encoding_for_format("audio/aac"), AudioEncoding::WebmOpus);
    }

    #[test]
    fn validates_locales() {
        assert!(is_supported_language("ko-KR"));
        assert!(is_supported_language("en-US"));
        assert!(!is_supported_language("xx-XX"));
        assert!(!is_supported_language("ko"));
    }
}
