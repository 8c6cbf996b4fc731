use async_trait::async_trait;
use playtalk_core::{AudioError, AudioPlayback};

/// Stands in for an output device that could not be opened.
///
/// Every chunk is rejected with the original reason, so the session keeps
/// running and each dropped chunk is reported like any other playback error.
#[derive(Debug, Clone)]
pub struct SilentPlayback {
    reason: String,
}

impl SilentPlayback {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AudioPlayback for SilentPlayback {
    async fn play(&self, _data: &str) -> Result<(), AudioError> {
        Err(AudioError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_chunk_is_rejected_with_reason() {
        let playback = SilentPlayback::new("No output device available");
        for _ in 0..2 {
            let err = playback.play("QQ==").await.unwrap_err();
            assert_eq!(
                err,
                AudioError::Unavailable("No output device available".to_string())
            );
        }
    }
}
