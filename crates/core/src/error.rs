/// Failures of the audio collaborators. None of these end a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    /// The device could not be acquired (missing, busy or access denied).
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),
    #[error("Audio device error: {0}")]
    Device(String),
    #[error("Error decoding audio data: {0}")]
    Decode(String),
    #[error("Error encoding audio data: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The controller task is gone, so commands can no longer be delivered.
    #[error("Session controller has stopped")]
    ControllerStopped,
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
