//! Web server and API implementation.
//!
//! This module provides the HTTP and WebSocket server functionality
//! for the relay service.

pub mod events;

mod handlers;
mod metrics;
mod state;
mod ws;

pub use handlers::{create_router, health_check, metrics_handler};
pub use metrics::ServiceMetrics;
pub use state::AppState;
