/// A run of interleaved audio samples handed through the chain once per
/// callback period.
///
/// Effects transform blocks in place.  The backing `Vec` keeps its capacity
/// across calls, so a block allocated once per stream never reallocates as
/// long as device periods stay within that capacity.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    pub samples:  Vec<f32>,
    pub channels: usize,
}

impl AudioBlock {
    pub fn mono(samples: Vec<f32>) -> Self {
        Self { samples, channels: 1 }
    }

    pub fn interleaved(samples: Vec<f32>, channels: usize) -> Self {
        Self { samples, channels: channels.max(1) }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { samples: Vec::with_capacity(capacity), channels: 1 }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }

    /// Replace the contents with `src` without giving up capacity.
    pub fn fill_from(&mut self, src: &[f32], channels: usize) {
        self.samples.clear();
        self.samples.extend_from_slice(src);
        self.channels = channels.max(1);
    }

    /// Average all channels into one, in place.
    pub fn downmix_to_mono(&mut self) {
        if self.channels == 1 {
            return;
        }
        let ch = self.channels;
        let frames = self.frames();
        for frame in 0..frames {
            let start = frame * ch;
            let sum: f32 = self.samples[start..start + ch].iter().sum();
            self.samples[frame] = sum / ch as f32;
        }
        self.samples.truncate(frames);
        self.channels = 1;
    }

    /// Write the channel average of each frame into `out`, replacing its
    /// contents.  Allocates only if `out` is shorter than the block.
    pub fn downmix_into(&self, out: &mut Vec<f32>) {
        out.clear();
        if self.channels == 1 {
            out.extend_from_slice(&self.samples);
            return;
        }
        let ch = self.channels as f32;
        out.extend(self.samples.chunks_exact(self.channels).map(|frame| frame.iter().sum::<f32>() / ch));
    }

    /// Duplicate a mono block across `channels` interleaved channels, in place.
    pub fn expand_mono(&mut self, channels: usize) {
        if channels <= 1 || self.channels != 1 {
            return;
        }
        let frames = self.samples.len();
        self.samples.resize(frames * channels, 0.0);
        // Walk backwards so no source frame is overwritten before it is read.
        for frame in (0..frames).rev() {
            let value = self.samples[frame];
            for ch in 0..channels {
                self.samples[frame * channels + ch] = value;
            }
        }
        self.channels = channels;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_frames() {
        let mut block = AudioBlock::interleaved(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        block.downmix_to_mono();
        assert_eq!(block.channels, 1);
        assert_eq!(block.samples, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn downmix_into_reuses_buffer() {
        let block = AudioBlock::interleaved(vec![1.0, 0.0, 0.5, 0.5], 2);
        let mut out = vec![9.0; 8];
        block.downmix_into(&mut out);
        assert_eq!(out, vec![0.5, 0.5]);
        assert_eq!(block.samples.len(), 4);
    }

    #[test]
    fn expand_mono_duplicates() {
        let mut block = AudioBlock::mono(vec![0.1, 0.2, 0.3]);
        block.expand_mono(2);
        assert_eq!(block.channels, 2);
        assert_eq!(block.samples, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn expand_is_noop_for_multichannel() {
        let mut block = AudioBlock::interleaved(vec![0.1, 0.2], 2);
        block.expand_mono(4);
        assert_eq!(block.channels, 2);
        assert_eq!(block.samples.len(), 2);
    }
}
