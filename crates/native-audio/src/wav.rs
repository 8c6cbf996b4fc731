use hound::{SampleFormat, WavSpec, WavWriter};
use playtalk_core::AudioError;
use std::io::Cursor;

/// Wraps mono samples in a complete 16-bit PCM WAV container.
///
/// Each captured chunk is encoded on its own, so every chunk sent to the
/// service is independently decodable.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        for &sample in samples {
            let v = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer.write_sample(v).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

fn encode_err(e: hound::Error) -> AudioError {
    AudioError::Encode(e.to_string())
}
