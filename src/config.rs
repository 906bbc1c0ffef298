//! Application-wide configuration and constants.
//!
//! This module centralizes all configuration values, whether loaded from environment
//! variables or defined as constants. This promotes the DRY principle and makes
//! configuration changes easier to manage.

use figment::{
    providers::{Env, Format, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::session::channel::BackpressurePolicy;

/// Audio processing constants
pub mod audio {
    /// Sample rate expected from browser capture (WebM/Opus)
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 48_000;

    /// Recognition model tuned for low-latency streaming
    pub const STREAMING_MODEL: &str = "latest_short";

    /// Maximum size of a single audio frame accepted over the transport
    pub const MAX_CHUNK_SIZE_BYTES: usize = 1024 * 1024; // 1MB
}

/// Streaming session constants
pub mod streaming {
    use std::time::Duration;

    /// Bounded capacity of the per-session audio hand-off channel, in chunks.
    /// The original relay buffered without limit; a slow recognizer must not
    /// grow memory unbounded.
    pub const AUDIO_CHANNEL_CAPACITY: usize = 64;

    /// How long the recognition worker waits on the channel before re-checking
    /// the cancellation token. Liveness fallback only.
    pub const WORKER_POLL_TIMEOUT: Duration = Duration::from_secs(1);

    /// Upper bound on how long an enqueue may wait for channel space under the
    /// blocking backpressure policy.
    pub const ENQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

    /// Retry interval while waiting for channel space.
    pub const ENQUEUE_RETRY_INTERVAL: Duration = Duration::from_millis(10);

    /// Capacity of the per-connection outbound event queue.
    pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
}

// Default value functions for serde defaults
fn default_server_host() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    8000
}
fn default_recognizer_endpoint() -> String {
    "http://localhost:9090".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
fn default_language() -> String {
    "ko-KR".to_string()
}
fn default_sample_rate_hertz() -> u32 {
    audio::DEFAULT_SAMPLE_RATE_HZ
}
fn default_recognition_model() -> String {
    audio::STREAMING_MODEL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_audio_channel_capacity() -> usize {
    streaming::AUDIO_CHANNEL_CAPACITY
}
fn default_backpressure() -> BackpressurePolicy {
    BackpressurePolicy::Block
}

/// Application configuration loaded from multiple sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server host
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// HTTP server port
    #[serde(default = "default_server_port")]
    pub server_port: u16,

    /// gRPC endpoint of the speech recognition service
    #[serde(default = "default_recognizer_endpoint")]
    pub recognizer_endpoint: String,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Default recognition locale for new sessions
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Sample rate reported to the recognizer
    #[serde(default = "default_sample_rate_hertz")]
    pub sample_rate_hertz: u32,

    /// Recognition model name
    #[serde(default = "default_recognition_model")]
    pub recognition_model: String,

    /// Whether the recognizer should insert punctuation
    #[serde(default = "default_true")]
    pub enable_automatic_punctuation: bool,

    /// Whether interim (non-final) results are relayed
    #[serde(default = "default_true")]
    pub interim_results: bool,

    /// Bounded capacity of the per-session audio channel, in chunks
    #[serde(default = "default_audio_channel_capacity")]
    pub audio_channel_capacity: usize,

    /// What to do when audio arrives faster than the recognizer consumes it
    #[serde(default = "default_backpressure")]
    pub backpressure: BackpressurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
            recognizer_endpoint: default_recognizer_endpoint(),
            allowed_origins: default_allowed_origins(),
            default_language: default_language(),
            sample_rate_hertz: default_sample_rate_hertz(),
            recognition_model: default_recognition_model(),
            enable_automatic_punctuation: true,
            interim_results: true,
            audio_channel_capacity: default_audio_channel_capacity(),
            backpressure: default_backpressure(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. config.yaml (if exists)
    /// 3. config.toml (if exists)
    /// 4. Built-in defaults (lowest priority)
    pub fn load() -> Result<Self> {
        let config: Config = Figment::new()
            .merge(Self::default_figment())
            .merge(Toml::file("config.toml"))
            .merge(Yaml::file("config.yaml"))
            .merge(Env::prefixed("STT_RELAY_"))
            .extract()
            .map_err(|e| AppError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Generate default configuration values
    fn default_figment() -> Figment {
        use figment::providers::Serialized;

        Figment::from(Serialized::defaults(Config::default()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.recognizer_endpoint.starts_with("http://")
            && !self.recognizer_endpoint.starts_with("https://")
        {
            return Err(AppError::Configuration(
                "recognizer_endpoint must start with http:// or https://".to_string(),
            ));
        }

        if self.server_host.is_empty() {
            return Err(AppError::Configuration(
                "server_host cannot be empty".to_string(),
            ));
        }

        if self.server_port < 1024 {
            return Err(AppError::Configuration(
                "server_port must be between 1024 and 65535".to_string(),
            ));
        }

        if self.audio_channel_capacity == 0 {
            return Err(AppError::Configuration(
                "audio_channel_capacity must be at least 1".to_string(),
            ));
        }

        if !crate::audio::is_supported_language(&self.default_language) {
            return Err(AppError::Configuration(format!(
                "default_language '{}' is not a supported locale",
                self.default_language
            )));
        }

        Ok(())
    }

    /// Export configuration to TOML format
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::Configuration(format!("Failed to serialize to TOML: {}", e)))
    }

    /// Export configuration to YAML format
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| AppError::Configuration(format!("Failed to serialize to YAML: {}", e)))
    }
}
