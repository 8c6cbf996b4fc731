//! Defines the JSON frame protocol spoken on the Play.ai talk WebSocket.
//!
//! Every frame is a JSON object tagged by a `type` field. The client sends
//! `setup` once and then `audioIn` frames; of the frames the service sends,
//! only `audioStream` carries meaning for this client, all others are kept
//! opaquely for display.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The inbound frame type that carries audio for playback.
pub const AUDIO_STREAM: &str = "audioStream";

/// Frames sent from this client to the service.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    /// The handshake. Must be the first frame on a connection.
    Setup(SetupFrame),
    /// One chunk of captured audio, base64 encoded.
    AudioIn { data: String },
}

impl ClientFrame {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Payload of the `setup` frame.
///
/// The agent is selected by the connection address, so only the credential
/// and the optional audio format negotiation travel here.
#[derive(Serialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetupFrame {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sample_rate: Option<u32>,
}

impl fmt::Debug for SetupFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupFrame")
            .field("api_key", &"[REDACTED]")
            .field("output_format", &self.output_format)
            .field("output_sample_rate", &self.output_sample_rate)
            .field("input_encoding", &self.input_encoding)
            .field("input_sample_rate", &self.input_sample_rate)
            .finish()
    }
}

/// Any frame received from the service.
///
/// Fields other than `type` are preserved as they arrived so the frame can be
/// rendered back in full.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InboundFrame {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn is_audio_stream(&self) -> bool {
        self.kind == AUDIO_STREAM
    }

    /// The base64 audio payload, present only on `audioStream` frames.
    pub fn audio_data(&self) -> Option<&str> {
        if !self.is_audio_stream() {
            return None;
        }
        self.fields.get("data").and_then(Value::as_str)
    }
}
