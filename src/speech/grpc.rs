//! gRPC implementation of the recognizer seam.
//!
//! Wraps the generated duplex client so it presents the blocking call shape
//! the session worker expects. The worker thread drives the response stream
//! one message at a time through a runtime handle; a feeder thread pushes the
//! settings frame and audio frames into the request stream.

use std::collections::VecDeque;
use std::thread;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tonic::transport::Channel;
use tracing::debug;

use crate::audio::AudioEncoding;
use crate::error::{AppError, Result};
use crate::speech::proto::{
    self, recognition_config, speech_client::SpeechClient,
    streaming_recognize_request::StreamingRequest,
};
use crate::speech::recognizer::{AudioFrames, RecognitionEvents, SpeechRecognizer};
use crate::speech::types::{RecognitionResult, RecognizerSettings};

/// Depth of the request-stream buffer between the feeder thread and tonic.
const REQUEST_BUFFER: usize = 16;

/// A recognizer backed by a gRPC speech service.
#[derive(Clone)]
pub struct GrpcRecognizer {
    channel: Channel,
    handle: Handle,
}

impl GrpcRecognizer {
    /// Connect to the recognition service.
    ///
    /// Captures the current runtime handle; the blocking calls later drive
    /// their futures through it from worker threads.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let channel = Channel::from_shared(endpoint.to_string())
            .map_err(|e| AppError::Configuration(format!("invalid recognizer endpoint: {}", e)))?
            .connect()
            .await?;

        Ok(Self {
            channel,
            handle: Handle::current(),
        })
    }

    fn client(&self) -> SpeechClient<Channel> {
        SpeechClient::new(self.channel.clone())
    }
}

impl SpeechRecognizer for GrpcRecognizer {
    fn streaming_recognize(
        &self,
        settings: RecognizerSettings,
        audio: AudioFrames,
    ) -> Result<RecognitionEvents> {
        let (tx, rx) = mpsc::channel::<proto::StreamingRecognizeRequest>(REQUEST_BUFFER);

        let config_frame = proto::StreamingRecognizeRequest {
            streaming_request: Some(StreamingRequest::StreamingConfig(
                proto::StreamingRecognitionConfig {
                    config: Some(proto_config(&settings)),
                    interim_results: settings.interim_results,
                    single_utterance: false,
                },
            )),
        };

        // The feeder owns the request side: settings frame first, then audio
        // frames until the feed iterator ends. Dropping the sender half-closes
        // the call.
        thread::Builder::new()
            .name("recognizer-feed".to_string())
            .spawn(move || {
                if tx.blocking_send(config_frame).is_err() {
                    return;
                }
                for chunk in audio {
                    let frame = proto::StreamingRecognizeRequest {
                        streaming_request: Some(StreamingRequest::AudioContent(chunk.to_vec())),
                    };
                    if tx.blocking_send(frame).is_err() {
                        break;
                    }
                }
                debug!("recognizer request feed closed");
            })
            .map_err(|e| AppError::Internal(format!("failed to spawn feeder thread: {}", e)))?;

        let requests = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        let mut client = self.client();
        let responses = self
            .handle
            .block_on(client.streaming_recognize(requests))?
            .into_inner();

        Ok(Box::new(GrpcEvents {
            responses,
            handle: self.handle.clone(),
            pending: VecDeque::new(),
        }))
    }

    fn recognize(
        &self,
        settings: RecognizerSettings,
        audio: Bytes,
    ) -> Result<Vec<RecognitionResult>> {
        let request = proto::RecognizeRequest {
            config: Some(proto_config(&settings)),
            audio: Some(proto::RecognitionAudio {
                content: audio.to_vec(),
            }),
        };

        let mut client = self.client();
        let response = self.handle.block_on(client.recognize(request))?.into_inner();

        Ok(response
            .results
            .into_iter()
            .filter_map(|result| {
                result.alternatives.into_iter().next().map(|alt| {
                    RecognitionResult {
                        transcript: alt.transcript,
                        confidence: alt.confidence,
                        is_final: true,
                    }
                })
            })
            .collect())
    }
}

/// Blocking iterator over the duplex response stream.
struct GrpcEvents {
    responses: tonic::Streaming<proto::StreamingRecognizeResponse>,
    handle: Handle,
    pending: VecDeque<RecognitionResult>,
}

impl Iterator for GrpcEvents {
    type Item = Result<RecognitionResult>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Some(Ok(result));
            }

            match self.handle.block_on(self.responses.message()) {
                Ok(Some(response)) => {
                    self.pending
                        .extend(response.results.into_iter().filter_map(top_alternative));
                }
                Ok(None) => return None,
                Err(status) => return Some(Err(status.into())),
            }
        }
    }
}

/// Flatten a wire result into the domain event, keeping the top alternative.
/// Results with no alternatives carry nothing to relay and are skipped.
fn top_alternative(result: proto::StreamingRecognitionResult) -> Option<RecognitionResult> {
    let is_final = result.is_final;
    result.alternatives.into_iter().next().map(|alt| {
        RecognitionResult {
            transcript: alt.transcript,
            confidence: alt.confidence,
            is_final,
        }
    })
}

fn proto_config(settings: &RecognizerSettings) -> proto::RecognitionConfig {
    let encoding = match settings.encoding {
        AudioEncoding::Linear16 => recognition_config::AudioEncoding::Linear16,
        AudioEncoding::Flac => recognition_config::AudioEncoding::Flac,
        AudioEncoding::Mp3 => recognition_config::AudioEncoding::Mp3,
        AudioEncoding::OggOpus => recognition_config::AudioEncoding::OggOpus,
        AudioEncoding::WebmOpus => recognition_config::AudioEncoding::WebmOpus,
    };

    proto::RecognitionConfig {
        encoding: encoding as i32,
        sample_rate_hertz: settings.sample_rate_hertz as i32,
        language_code: settings.language_code.clone(),
        enable_automatic_punctuation: settings.enable_automatic_punctuation,
        model: settings.model.clone(),
    }
}
