//! Microphone capture on the default cpal input device.

use crate::wav::encode_wav;
use async_trait::async_trait;
use cpal::{
    SampleFormat, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use playtalk_core::{
    AudioCapture, AudioChunk, AudioError,
    audio::CHUNK_INTERVAL,
};
use ringbuf::{HeapCons, HeapProd, HeapRb, traits::*};
use std::{sync::mpsc as std_mpsc, thread, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// Seconds of audio the ring buffer holds between two chunk boundaries.
const BUFFER_SECONDS: usize = 4;

/// Records from the default input device and emits one WAV chunk per
/// interval.
///
/// The cpal stream lives on its own thread for as long as capture runs; it is
/// dropped (releasing the microphone) on `stop` or when this value is dropped.
pub struct CpalCapture {
    interval: Duration,
    worker: Option<CaptureWorker>,
}

struct CaptureWorker {
    release: std_mpsc::Sender<()>,
    device_thread: Option<thread::JoinHandle<()>>,
    chunker: JoinHandle<()>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self::with_interval(CHUNK_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            worker: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self, sink: mpsc::Sender<AudioChunk>) -> Result<(), AudioError> {
        if self.worker.is_some() {
            warn!("Already capturing");
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        let device_thread = thread::Builder::new()
            .name("playtalk-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream() {
                    Ok((stream, sample_rate, consumer)) => {
                        let _ = ready_tx.send(Ok((sample_rate, consumer)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Blocks until stop() signals or drops the sender.
                let _ = release_rx.recv();
                drop(stream);
                info!("Microphone released");
            })
            .map_err(|e| AudioError::Device(format!("Failed to spawn capture thread: {}", e)))?;

        let (sample_rate, consumer) = match ready_rx.await {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                let _ = device_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = device_thread.join();
                return Err(AudioError::Device("capture thread exited".to_string()));
            }
        };

        let chunker = tokio::spawn(run_chunker(consumer, sample_rate, self.interval, sink));
        self.worker = Some(CaptureWorker {
            release: release_tx,
            device_thread: Some(device_thread),
            chunker,
        });
        info!(sample_rate, "Started audio capture");
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };
        worker.chunker.abort();
        let _ = worker.release.send(());
        if let Some(thread) = worker.device_thread.take() {
            join_device_thread(thread);
        }
        info!("Stopped audio capture");
    }
}

/// Waits for the device thread to drop its stream. Inside a runtime the wait
/// moves to the blocking pool so no async worker is held up.
fn join_device_thread(thread: thread::JoinHandle<()>) {
    let join = move || {
        if thread.join().is_err() {
            error!("Capture thread panicked");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(join);
        }
        Err(_) => join(),
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens the default input device and starts streaming mono f32 samples into
/// a ring buffer.
fn open_input_stream() -> Result<(Stream, u32, HeapCons<f32>), AudioError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| AudioError::Unavailable("No input device available".to_string()))?;
    info!(
        "Using input device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported = device
        .default_input_config()
        .map_err(|e| AudioError::Unavailable(format!("Failed to get input config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let ring = HeapRb::<f32>::new(sample_rate as usize * BUFFER_SECONDS);
    let (mut producer, consumer) = ring.split();
    let err_fn = |err| error!("Audio input stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data.iter().copied(), channels)
            },
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(
                    &mut producer,
                    data.iter().map(|&s| s as f32 / 32768.0),
                    channels,
                )
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::Unavailable(format!(
                "Unsupported input sample format: {:?}",
                other
            )));
        }
    }
    .map_err(|e| AudioError::Unavailable(format!("Failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::Unavailable(format!("Failed to start input stream: {}", e)))?;

    Ok((stream, sample_rate, consumer))
}

/// Averages interleaved frames to mono. Samples that do not fit are dropped.
fn push_mono(producer: &mut HeapProd<f32>, data: impl Iterator<Item = f32>, channels: usize) {
    let channels = channels.max(1);
    let mut frame_sum = 0.0f32;
    let mut in_frame = 0;
    for sample in data {
        frame_sum += sample;
        in_frame += 1;
        if in_frame == channels {
            let _ = producer.try_push(frame_sum / channels as f32);
            frame_sum = 0.0;
            in_frame = 0;
        }
    }
}

/// Drains the ring buffer once per interval into a WAV chunk.
async fn run_chunker(
    mut consumer: HeapCons<f32>,
    sample_rate: u32,
    period: Duration,
    sink: mpsc::Sender<AudioChunk>,
) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let samples: Vec<f32> = consumer.pop_iter().collect();
        if samples.is_empty() {
            continue;
        }
        match encode_wav(&samples, sample_rate) {
            Ok(bytes) => {
                if sink.send(AudioChunk::new(bytes)).await.is_err() {
                    debug!("Chunk receiver dropped, chunker exiting");
                    break;
                }
            }
            Err(e) => error!(error = %e, "Failed to encode audio chunk"),
        }
    }
}
