use std::path::Path;

use crate::audio_file::{resample_linear, AudioFile};
use crate::error::ChainError;
use crate::external::BlockProcessor;

/// Longest impulse response kept, in samples.
pub const MAX_IR_TAPS: usize = 8192;

/// Direct-form FIR convolution with an impulse response loaded from a WAV file.
pub struct ImpulseResponse {
    name:    String,
    taps:    Vec<f32>,
    history: Vec<f32>,
    pos:     usize,
}

impl ImpulseResponse {
    pub fn load<P: AsRef<Path>>(path: P, sample_rate: f32) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let file = AudioFile::load(path)?;
        if file.data.is_empty() {
            return Err(ChainError::Processor(format!("{} contains no samples", path.display())));
        }

        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "IR".to_string());
        log::info!(
            "Loaded IR {}: {} frames @ {} Hz, {} channel(s)",
            name, file.frames(), file.sample_rate, file.channels
        );
        Ok(Self::from_samples(name, &file.to_mono(), file.sample_rate as f32, sample_rate))
    }

    /// Build from a mono IR recorded at `source_rate`, resampled to `target_rate`.
    pub fn from_samples(name: impl Into<String>, ir: &[f32], source_rate: f32, target_rate: f32) -> Self {
        let mut taps = if (source_rate - target_rate).abs() > f32::EPSILON && source_rate > 0.0 {
            resample_linear(ir, 1, source_rate, target_rate)
        } else {
            ir.to_vec()
        };
        if taps.len() > MAX_IR_TAPS {
            log::warn!("IR truncated from {} to {} taps", taps.len(), MAX_IR_TAPS);
            taps.truncate(MAX_IR_TAPS);
        }
        if taps.is_empty() {
            taps.push(1.0);
        }
        let len = taps.len();
        Self { name: name.into(), taps, history: vec![0.0; len], pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    #[inline]
    fn next_sample(&mut self, x: f32) -> f32 {
        let len = self.taps.len();
        self.history[self.pos] = x;
        let mut acc = 0.0;
        let mut read = self.pos;
        for &h in &self.taps {
            acc += h * self.history[read];
            read = if read == 0 { len - 1 } else { read - 1 };
        }
        self.pos = (self.pos + 1) % len;
        acc
    }
}

impl BlockProcessor for ImpulseResponse {
    fn name(&self) -> &str { &self.name }

    fn prepare(&mut self, _sample_rate: f32, _max_block: usize) {
        self.history.fill(0.0);
        self.pos = 0;
    }

    fn process(&mut self, buffer: &mut [f32]) -> Result<(), ChainError> {
        for s in buffer.iter_mut() {
            *s = self.next_sample(*s);
        }
        Ok(())
    }
}
