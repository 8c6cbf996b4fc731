//! Decoding of received audio payloads into mono f32 samples.

use crate::resample::resample;
use base64::Engine;
use playtalk_core::AudioError;
use std::io::{Cursor, ErrorKind};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

/// Decoded audio, downmixed to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes a complete audio container (mp3, wav, ogg, flac, ...) from memory.
pub fn decode_audio(bytes: Vec<u8>) -> Result<DecodedAudio, AudioError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                sample_rate.get_or_insert(spec.rate);
                let channels = spec.channels.count().max(1);
                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);
                samples.extend(
                    interleaved
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            // A corrupt packet is skipped, the rest of the stream may be fine.
            Err(SymphoniaError::DecodeError(e)) => warn!(error = e, "Skipping undecodable packet"),
            Err(e) => return Err(decode_err(e)),
        }
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio frames decoded".to_string()));
    }
    let sample_rate =
        sample_rate.ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;
    debug!(samples = samples.len(), sample_rate, "Decoded audio");
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Takes the base64 `data` of an `audioStream` frame all the way to mono
/// samples at `target_rate`, ready for the mixer.
pub fn decode_for_output(data: &str, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| AudioError::Decode(format!("invalid base64: {}", e)))?;
    let decoded = decode_audio(bytes)?;
    resample(&decoded.samples, decoded.sample_rate, target_rate)
}

fn decode_err(e: SymphoniaError) -> AudioError {
    AudioError::Decode(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::encode_wav;
    use approx::assert_abs_diff_eq;

    fn sine(len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_decode_wav_chunk() {
        let original = sine(1600, 16000);
        let bytes = encode_wav(&original, 16000).unwrap();

        let decoded = decode_audio(bytes).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.samples.len(), original.len());
        for (a, b) in original.iter().zip(decoded.samples.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 0.001);
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = decode_audio(b"definitely not audio".to_vec()).unwrap_err();
        assert!(matches!(err, AudioError::Decode(_)));
    }

    #[test]
    fn test_decode_for_output_rejects_bad_base64() {
        let err = decode_for_output("not//base64!!", 48000).unwrap_err();
        match err {
            AudioError::Decode(msg) => assert!(msg.contains("invalid base64")),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_for_output_single_byte_payload_fails() {
        // "QQ==" is the single byte 'A': valid base64, not a container.
        assert!(decode_for_output("QQ==", 48000).is_err());
    }

    #[test]
    fn test_decode_for_output_resamples() {
        let bytes = encode_wav(&sine(8000, 16000), 16000).unwrap();
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);

        let same_rate = decode_for_output(&data, 16000).unwrap();
        assert_eq!(same_rate.len(), 8000);

        let upsampled = decode_for_output(&data, 48000).unwrap();
        let expected = 8000.0 * 3.0;
        assert!((upsampled.len() as f64 - expected).abs() < expected * 0.15);
    }
}
