//! Playtalk Core
//!
//! The realtime voice session against the Play.ai talk endpoint: the JSON
//! frame protocol, the session state machine, the append-only message log,
//! and the seams (traits) behind which the socket and the audio devices live.
//! Concrete socket and device implementations are provided by the
//! `playai-realtime` and `playtalk-native-audio` crates.

pub mod audio;
pub mod config;
pub mod error;
pub mod message_log;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

pub use audio::{AudioCapture, AudioChunk, AudioPlayback};
pub use config::{SessionConfig, SetupOptions};
pub use error::{AudioError, SessionError};
pub use message_log::MessageLog;
pub use protocol::{ClientFrame, InboundFrame};
pub use session::{SessionController, SessionEvent, SessionHandle};
pub use state::SessionState;
pub use transport::{Connector, TransportEvent, TransportHandle, TransportPeer};
