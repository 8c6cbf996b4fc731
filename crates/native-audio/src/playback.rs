//! Speaker playback on the default cpal output device.

use crate::{decode::decode_for_output, mixer::Mixer};
use async_trait::async_trait;
use cpal::{
    SampleFormat, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use playtalk_core::{AudioError, AudioPlayback};
use std::{
    sync::{Arc, Mutex, mpsc as std_mpsc},
    thread,
};
use tracing::{debug, error, info};

/// Plays decoded chunks through one long-lived output stream.
///
/// Each `play` decodes off the async runtime and then adds the result to the
/// mixer as a new voice, so it starts on the next output buffer.
pub struct CpalPlayback {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    release: Option<std_mpsc::Sender<()>>,
    device_thread: Option<thread::JoinHandle<()>>,
}

impl CpalPlayback {
    /// Opens the default output device.
    pub fn open() -> Result<Self, AudioError> {
        let mixer = Arc::new(Mutex::new(Mixer::new()));
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let (release_tx, release_rx) = std_mpsc::channel::<()>();

        let stream_mixer = Arc::clone(&mixer);
        let device_thread = thread::Builder::new()
            .name("playtalk-playback".to_string())
            .spawn(move || {
                let stream = match open_output_stream(stream_mixer) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = release_rx.recv();
                drop(stream);
                info!("Audio output released");
            })
            .map_err(|e| AudioError::Device(format!("Failed to spawn playback thread: {}", e)))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| AudioError::Device("playback thread exited".to_string()))??;

        info!(sample_rate, "Started audio playback");
        Ok(Self {
            mixer,
            sample_rate,
            release: Some(release_tx),
            device_thread: Some(device_thread),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[async_trait]
impl AudioPlayback for CpalPlayback {
    async fn play(&self, data: &str) -> Result<(), AudioError> {
        let data = data.to_string();
        let target_rate = self.sample_rate;
        let samples = tokio::task::spawn_blocking(move || decode_for_output(&data, target_rate))
            .await
            .map_err(|e| AudioError::Decode(format!("decode task failed: {}", e)))??;

        debug!(samples = samples.len(), "Scheduling decoded audio");
        self.mixer
            .lock()
            .map_err(|_| AudioError::Device("mixer lock poisoned".to_string()))?
            .add_voice(samples);
        Ok(())
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
        if let Some(thread) = self.device_thread.take() {
            if thread.join().is_err() {
                error!("Playback thread panicked");
            }
        }
    }
}

fn open_output_stream(mixer: Arc<Mutex<Mixer>>) -> Result<(cpal::Stream, u32), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Unavailable("No output device available".to_string()))?;
    info!(
        "Using output device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Unavailable(format!("Failed to get output config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    let err_fn = |err| error!("Audio output stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match mixer.lock() {
                Ok(mut mixer) => mixer.fill(data, channels),
                Err(_) => data.fill(0.0),
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => {
            let mut scratch = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0f32);
                    match mixer.lock() {
                        Ok(mut mixer) => mixer.fill(&mut scratch, channels),
                        Err(_) => scratch.fill(0.0),
                    }
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = (sample * i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(AudioError::Unavailable(format!(
                "Unsupported output sample format: {:?}",
                other
            )));
        }
    }
    .map_err(|e| AudioError::Unavailable(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::Unavailable(format!("Failed to start output stream: {}", e)))?;

    Ok((stream, sample_rate))
}
