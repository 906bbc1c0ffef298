//! Speech recognition service integration.
//!
//! This module provides the recognizer trait seam, its domain types, and the
//! gRPC client implementation for the duplex recognition service.

// Re-export proto definitions
pub mod proto {
    tonic::include_proto!("speech.v1");
}

mod grpc;
mod recognizer;
mod types;

#[cfg(test)]
pub mod testing;

pub use grpc::GrpcRecognizer;
pub use recognizer::{AudioFrames, RecognitionEvents, SpeechRecognizer};
pub use types::{RecognitionResult, RecognizerSettings};
