//! The audio seams of a session: microphone capture and speaker playback.
//!
//! Both are driven by the session controller but implemented outside this
//! crate, so the controller never touches a device directly.

use crate::error::AudioError;
use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;
use tokio::sync::mpsc;

/// How often capture hands over a chunk of recorded audio.
pub const CHUNK_INTERVAL: Duration = Duration::from_millis(1000);

/// One interval of captured audio, already wrapped in a container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    bytes: Vec<u8>,
}

impl AudioChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The text-safe form carried in an `audioIn` frame.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Microphone capture.
///
/// `start` acquires the input device and then delivers a chunk to `sink`
/// every [`CHUNK_INTERVAL`] until `stop` is called or `sink` is closed.
/// `stop` must release the device and be safe to call at any time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioCapture: Send {
    async fn start(&mut self, sink: mpsc::Sender<AudioChunk>) -> Result<(), AudioError>;

    fn stop(&mut self);
}

/// Speaker playback of audio received from the service.
///
/// `play` takes the base64 payload of an `audioStream` frame, decodes it, and
/// schedules it to start immediately. Successive calls are independent and
/// may overlap.
#[async_trait]
pub trait AudioPlayback: Send + Sync {
    async fn play(&self, data: &str) -> Result<(), AudioError>;
}
