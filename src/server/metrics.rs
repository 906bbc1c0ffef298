//! Service metrics tracking.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Tracks connection and session counts for the health endpoint and the
/// welcome event.
#[derive(Debug)]
pub struct ServiceMetrics {
    /// Number of currently connected WebSocket clients
    active_connections: AtomicUsize,

    /// Total connections accepted since startup
    total_connections: AtomicU64,

    /// Total streaming sessions started since startup
    sessions_started: AtomicU64,

    /// Number of errors reported to clients
    errors: AtomicU64,

    /// Server start time
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            active_connections: AtomicUsize::new(0),
            total_connections: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record an accepted connection; returns the live connection count.
    pub fn connection_opened(&self) -> usize {
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        self.active_connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    /// Get all metrics as a serde_json::Value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "active_connections": self.active_connections.load(Ordering::SeqCst),
            "total_connections": self.total_connections.load(Ordering::SeqCst),
            "sessions_started": self.sessions_started.load(Ordering::SeqCst),
            "errors": self.errors.load(Ordering::SeqCst),
        })
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
