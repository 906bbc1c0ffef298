//! The `stt_relay_server` core library.
//!
//! This crate relays live audio from WebSocket clients into a duplex
//! speech-recognition service and streams interim/final transcripts back in
//! real time. The heart of it is the session module: per-connection lifecycle
//! management and the bridge between the async transport side and the
//! blocking recognition call.

pub mod audio;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod speech;
