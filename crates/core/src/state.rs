use std::fmt;

/// Lifecycle of the single voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// The socket is being negotiated; no frames may be sent yet.
    Connecting,
    /// The socket is open and the handshake has been sent.
    Connected,
}

impl SessionState {
    /// Whether a session exists at all. Connecting and Connected collapse
    /// here, which is what a connect/disconnect button shows.
    pub fn is_active(self) -> bool {
        !matches!(self, SessionState::Disconnected)
    }

    /// Frames may only go out on an open socket.
    pub fn can_send(self) -> bool {
        matches!(self, SessionState::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        };
        f.write_str(label)
    }
}
