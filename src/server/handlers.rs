//! HTTP and WebSocket request handlers.
//!
//! This module provides the HTTP handlers and the router for the relay
//! service.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::HeaderValue,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use crate::audio::{self, SUPPORTED_LANGUAGES};
use crate::error::{AppError, Result};
use crate::server::{ws, AppState};
use crate::speech::RecognizerSettings;

/// Request body for single-shot transcription.
#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded audio payload
    pub audio_content: String,

    /// MIME type of the payload; defaults to WebM/Opus
    #[serde(default)]
    pub format: Option<String>,

    /// Recognition locale; defaults to the server's configured locale
    #[serde(default)]
    pub language: Option<String>,
}

/// Response body for single-shot transcription.
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    pub confidence: f32,
    pub language: String,
    pub timestamp: String,
}

/// Handle WebSocket upgrade for streaming transcription.
pub async fn handle_stream(
    upgrade: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws::handle_connection(socket, state))
}

/// Handle a single-shot transcription request.
pub async fn handle_transcribe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>> {
    let language = request
        .language
        .unwrap_or_else(|| state.config.default_language.clone());
    if !audio::is_supported_language(&language) {
        return Err(AppError::Validation(format!(
            "unsupported language code: {}",
            language
        )));
    }

    let payload = BASE64
        .decode(request.audio_content.as_bytes())
        .map_err(|e| AppError::Validation(format!("invalid base64 audio payload: {}", e)))?;
    if payload.is_empty() {
        return Err(AppError::Validation("empty audio payload".to_string()));
    }

    let format = request.format.as_deref().unwrap_or("audio/webm");
    let settings = RecognizerSettings::from_config(&state.config, &language, format);

    // The recognizer call blocks; keep it off the primary context.
    let recognizer = state.recognizer.clone();
    let results = tokio::task::spawn_blocking(move || {
        recognizer.recognize(settings, Bytes::from(payload))
    })
    .await
    .map_err(|e| AppError::Internal(format!("transcription task failed: {}", e)))??;

    let (transcript, confidence) = results
        .first()
        .map(|r| (r.transcript.clone(), r.confidence))
        .unwrap_or_default();
    info!(language = %language, confidence = confidence as f64, "batch transcription complete");

    Ok(Json(TranscribeResponse {
        transcript,
        confidence,
        language,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Service banner endpoint.
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "STT Relay Server",
        "status": "running",
    }))
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "active_connections": state.metrics.active_connections(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

/// Supported recognition locales.
pub async fn supported_languages() -> impl IntoResponse {
    let languages: BTreeMap<&str, &str> = SUPPORTED_LANGUAGES.iter().copied().collect();
    Json(serde_json::json!({ "languages": languages }))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/", get(root))
        .route("/ws", get(handle_stream))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/languages", get(supported_languages))
        .route("/transcribe", post(handle_transcribe))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}
