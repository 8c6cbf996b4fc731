use playtalk_core::AudioError;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

const RESAMPLE_CHUNK: usize = 1024;

/// Creates a mono resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>, AudioError> {
    FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )
    .map_err(|e| AudioError::Decode(format!("failed to create resampler: {}", e)))
}

/// Resamples a whole mono buffer. The tail is zero-padded to a full chunk.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::Decode("sample rate must be non-zero".to_string()));
    }

    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, RESAMPLE_CHUNK)?;
    let ratio = to_rate as f64 / from_rate as f64;
    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + RESAMPLE_CHUNK);
    let resample_err = |e: rubato::ResampleError| AudioError::Decode(format!("resampling failed: {}", e));

    let mut position = 0;
    while samples.len() - position >= resampler.input_frames_next() {
        let needed = resampler.input_frames_next();
        let chunk: &[&[f32]] = &[&samples[position..position + needed]];
        let frames = resampler
            .process(chunk, None)
            .map_err(resample_err)?;
        output.extend_from_slice(&frames[0]);
        position += needed;
    }
    if position < samples.len() {
        let tail: &[&[f32]] = &[&samples[position..]];
        let frames = resampler
            .process_partial(Some(tail), None)
            .map_err(resample_err)?;
        output.extend_from_slice(&frames[0]);
    }
    Ok(output)
}
