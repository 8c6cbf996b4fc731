use playtalk_core::{AudioError, AudioPlayback};
use playtalk_native_audio::SilentPlayback;
use std::sync::Arc;
use tracing::warn;

/// Falls back to [`SilentPlayback`] when the output device cannot be opened,
/// so the session still runs and logs every frame.
pub fn playback_or_silent<P>(opened: Result<P, AudioError>) -> Arc<dyn AudioPlayback>
where
    P: AudioPlayback + 'static,
{
    match opened {
        Ok(playback) => Arc::new(playback),
        Err(e) => {
            warn!(error = %e, "Audio output unavailable, received audio will not be played");
            Arc::new(SilentPlayback::new(e.to_string()))
        }
    }
}
