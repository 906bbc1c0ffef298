//! Outbound event schema.
//!
//! Every message the server pushes to a client is one of these events,
//! serialized as JSON with a `type` tag. Events for one connection are
//! serialized through the connection's outbound queue, so transport writes
//! never interleave.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::session::SessionId;
use crate::speech::RecognitionResult;

/// A JSON event pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent once after the WebSocket handshake.
    Connection {
        message: String,
        timestamp: String,
        connections: usize,
        language: String,
    },

    /// Echo of a client text frame.
    Echo { message: String, timestamp: String },

    /// First binary frame started a streaming session.
    BinaryStreamingStarted {
        session_id: String,
        message: String,
        timestamp: String,
    },

    /// One interim or final recognition result.
    StreamingTranscription {
        message: String,
        confidence: f32,
        is_final: bool,
        language: String,
        timestamp: String,
    },

    /// The recognition call failed; the session is being stopped.
    StreamingError { message: String, timestamp: String },

    /// A protocol-level error; session state is unchanged.
    Error { message: String, timestamp: String },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ServerEvent {
    pub fn connection(connections: usize, language: &str) -> Self {
        Self::Connection {
            message: "WebSocket connection established. Send audio data to begin transcription."
                .to_string(),
            timestamp: now(),
            connections,
            language: language.to_string(),
        }
    }

    pub fn echo(message: &str) -> Self {
        Self::Echo {
            message: format!("echo: {}", message),
            timestamp: now(),
        }
    }

    pub fn binary_streaming_started(session_id: SessionId) -> Self {
        Self::BinaryStreamingStarted {
            session_id: session_id.to_string(),
            message: "Real-time transcription started from binary audio data".to_string(),
            timestamp: now(),
        }
    }

    pub fn transcription(result: &RecognitionResult, language: &str) -> Self {
        Self::StreamingTranscription {
            message: result.transcript.clone(),
            confidence: result.confidence,
            is_final: result.is_final,
            language: language.to_string(),
            timestamp: now(),
        }
    }

    pub fn streaming_error(message: &str) -> Self {
        Self::StreamingError {
            message: message.to_string(),
            timestamp: now(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            timestamp: now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_event_wire_shape() {
        let json = serde_json::to_value(ServerEvent::connection(3, "ko-KR")).unwrap();
        assert_eq!(json["type"], "connection");
        assert_eq!(json["connections"], 3);
        assert_eq!(json["language"], "ko-KR");
        assert!(json["message"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn transcription_event_wire_shape() {
        let result = RecognitionResult {
            transcript: "hello world".to_string(),
            confidence: 0.92,
            is_final: true,
        };
        let json = serde_json::to_value(ServerEvent::transcription(&result, "en-US")).unwrap();
        assert_eq!(json["type"], "streaming_transcription");
        assert_eq!(json["message"], "hello world");
        assert_eq!(json["is_final"], true);
        assert_eq!(json["language"], "en-US");
        assert!((json["confidence"].as_f64().unwrap() - 0.92).abs() < 1e-6);
    }

    #[test]
    fn error_events_are_distinct_types() {
        let streaming = serde_json::to_value(ServerEvent::streaming_error("engine down")).unwrap();
        let protocol = serde_json::to_value(ServerEvent::error("bad frame")).unwrap();
        assert_eq!(streaming["type"], "streaming_error");
        assert_eq!(protocol["type"], "error");
    }
}
