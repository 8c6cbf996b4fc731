/// A summing mixer of independent mono voices.
///
/// Every decoded chunk becomes its own voice starting at the next output
/// frame. Voices are not sequenced against each other, so chunks that decode
/// close together overlap.
#[derive(Debug, Default)]
pub struct Mixer {
    voices: Vec<Voice>,
}

#[derive(Debug)]
struct Voice {
    samples: Vec<f32>,
    position: usize,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voice(&mut self, samples: Vec<f32>) {
        if samples.is_empty() {
            return;
        }
        self.voices.push(Voice {
            samples,
            position: 0,
        });
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fills an interleaved buffer, copying the mono mix to every channel.
    /// Frames past the end of all voices are silent.
    pub fn fill(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let mut sum = 0.0f32;
            for voice in &mut self.voices {
                if let Some(sample) = voice.samples.get(voice.position) {
                    sum += *sample;
                    voice.position += 1;
                }
            }
            frame.fill(sum.clamp(-1.0, 1.0));
        }
        self.voices.retain(|v| v.position < v.samples.len());
    }
}
