use std::path::Path;

use crate::error::ChainError;

/// A WAV file decoded to interleaved `f32` samples.
pub struct AudioFile {
    pub data:        Vec<f32>,
    pub channels:    usize,
    pub sample_rate: u32,
}

impl AudioFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let mut reader = hound::WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        let data: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << spec.bits_per_sample.saturating_sub(1)) as f32;
                reader.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()?
            }
        };

        Ok(Self { data, channels: spec.channels.max(1) as usize, sample_rate: spec.sample_rate })
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Convert to `target_rate` in place of the original samples.
    pub fn resampled(self, target_rate: u32) -> Self {
        if target_rate == self.sample_rate || target_rate == 0 {
            return self;
        }
        let data = resample_linear(&self.data, self.channels, self.sample_rate as f32, target_rate as f32);
        Self { data, channels: self.channels, sample_rate: target_rate }
    }

    /// Channel-averaged copy of the samples.
    pub fn to_mono(&self) -> Vec<f32> {
        self.data
            .chunks(self.channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Linear-interpolation resample of interleaved `src` from `source_rate` to
/// `target_rate`.
pub fn resample_linear(src: &[f32], channels: usize, source_rate: f32, target_rate: f32) -> Vec<f32> {
    let channels = channels.max(1);
    let frames = src.len() / channels;
    if frames == 0 || source_rate <= 0.0 || target_rate <= 0.0 {
        return Vec::new();
    }
    let ratio = source_rate / target_rate;
    let out_frames = ((frames as f32) / ratio).round().max(1.0) as usize;
    let mut out = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let t = i as f32 * ratio;
        let idx = t.floor() as usize;
        let frac = t - idx as f32;
        for ch in 0..channels {
            let at = |frame: usize| if frame < frames { src[frame * channels + ch] } else { 0.0 };
            let (a, b) = (at(idx), at(idx + 1));
            out.push(a + (b - a) * frac);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_int_wav_scaled_to_unit() {
        let path = std::env::temp_dir().join("rusttuiamp_audio_file_test.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [16384i16, -16384, 0, 8192] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let file = AudioFile::load(&path).unwrap();
        assert_eq!(file.channels, 2);
        assert_eq!(file.sample_rate, 22050);
        assert_eq!(file.frames(), 2);
        assert_eq!(file.data, vec![0.5, -0.5, 0.0, 0.25]);
        assert_eq!(file.to_mono(), vec![0.0, 0.125]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn resampling_scales_length() {
        let src: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let out = resample_linear(&src, 1, 48000.0, 24000.0);
        assert_eq!(out.len(), 50);
        assert!((out[10] - 20.0).abs() < 1e-4);
    }

    #[test]
    fn resampling_keeps_channels_apart() {
        let file = AudioFile { data: vec![0.0, 1.0, 0.5, 1.0], channels: 2, sample_rate: 22050 };
        let up = file.resampled(44100);
        assert_eq!(up.sample_rate, 44100);
        assert_eq!(up.channels, 2);
        assert_eq!(up.frames(), 4);
        assert!((up.data[2] - 0.25).abs() < 1e-6);
        assert!(up.data.iter().skip(1).step_by(2).take(3).all(|&s| s == 1.0));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(AudioFile::load("/nonexistent/rusttuiamp.wav").is_err());
    }
}
