//! Custom error types for the stt-relay-server.
//!
//! This module provides a centralized error handling system using the `thiserror` crate
//! to define structured, typed errors with clear messages and proper error conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;
use thiserror::Error;
use tonic::Status as TonicStatus;

/// Primary error type for the application, covering all possible error cases.
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors raised by the external speech recognition service.
    #[error("Recognition error: {0}")]
    Recognition(String),

    /// Errors on the WebSocket transport (send/receive failure, disconnect).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Audio fed to a connection identity that has no active session.
    #[error("No active streaming session for connection {0}")]
    NoSession(crate::session::ConnectionId),

    /// The session's audio channel is full under the configured backpressure policy.
    #[error("Audio channel full: {0}")]
    ChannelFull(String),

    /// Audio fed to a session that is already stopping or closed.
    #[error("Session is stopping, audio rejected")]
    SessionStopping,

    /// Errors from invalid user input or requests.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Errors from invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Errors from the underlying IO system.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal server errors.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TonicStatus> for AppError {
    fn from(status: TonicStatus) -> Self {
        AppError::Recognition(status.to_string())
    }
}

impl From<tonic::transport::Error> for AppError {
    fn from(err: tonic::transport::Error) -> Self {
        AppError::Recognition(format!("recognizer connection error: {}", err))
    }
}

/// Implementation to convert AppError into an HTTP response for Axum.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NoSession(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::SessionStopping => (StatusCode::CONFLICT, self.to_string()),
            AppError::ChannelFull(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Recognition(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Transport(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type Result<T> = std::result::Result<T, AppError>;
