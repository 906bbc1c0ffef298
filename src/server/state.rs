//! Application state for dependency injection.
//!
//! This module provides the application state that is shared
//! between all request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::server::metrics::ServiceMetrics;
use crate::session::SessionRegistry;
use crate::speech::SpeechRecognizer;

/// Shared application state containing dependencies.
#[derive(Clone)]
pub struct AppState {
    /// The speech recognizer implementation
    pub recognizer: Arc<dyn SpeechRecognizer>,

    /// Registry of active streaming sessions
    pub registry: Arc<SessionRegistry>,

    /// Service metrics
    pub metrics: Arc<ServiceMetrics>,

    /// Server configuration
    pub config: Config,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        registry: Arc<SessionRegistry>,
        config: Config,
    ) -> Self {
        Self {
            recognizer,
            registry,
            metrics: Arc::new(ServiceMetrics::new()),
            config,
        }
    }
}
