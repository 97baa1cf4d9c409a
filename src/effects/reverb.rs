use super::{DelayLine, Effect, EffectKind, ParamSpec};
use crate::block::AudioBlock;

pub const PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("roomSize", "Room Size", 0.0, 1.0, 0.5),
    ParamSpec::new("damping",  "Damping",   0.0, 1.0, 0.5),
    ParamSpec::new("mix",      "Mix",       0.0, 1.0, 0.3),
];

const EARLY_TAPS: [(f32, f32); 4] = [(0.010, 0.7), (0.015, 0.6), (0.020, 0.5), (0.025, 0.4)];
const LATE_TAPS:  [(f32, f32); 4] = [(0.030, 0.3), (0.035, 0.25), (0.040, 0.2), (0.045, 0.15)];

/// Share of the early reflections fed into the late network.
const EARLY_TO_LATE: f32 = 0.5;

struct Tap {
    line: DelayLine,
    gain: f32,
}

impl Tap {
    fn bank(taps: &[(f32, f32)], sample_rate: f32) -> Vec<Tap> {
        taps.iter()
            .map(|&(secs, gain)| Tap { line: DelayLine::with_duration(secs, sample_rate), gain })
            .collect()
    }

    fn ensure_len(&mut self, frames: usize) {
        if let Err(e) = self.line.grow_to(frames) {
            log::error!("Reverb line could not grow to {} samples: {}", frames, e);
        }
    }
}

/// Early-reflection and late-reverberation delay banks, processed a whole
/// block at a time.
///
/// Each line is read and overwritten over a block-length window starting at
/// its cursor.  A line shorter than the block is zero-extended to the block
/// length first, so its delay becomes one block from then on.
pub struct ReverbEffect {
    enabled:       bool,
    pub room_size: f32,
    pub damping:   f32,
    pub mix:       f32,
    early:         Vec<Tap>,
    late:          Vec<Tap>,
    early_sum:     Vec<f32>,
    late_sum:      Vec<f32>,
}

impl ReverbEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            enabled:   true,
            room_size: PARAMS[0].default,
            damping:   PARAMS[1].default,
            mix:       PARAMS[2].default,
            early:     Tap::bank(&EARLY_TAPS, sample_rate),
            late:      Tap::bank(&LATE_TAPS, sample_rate),
            early_sum: Vec::new(),
            late_sum:  Vec::new(),
        }
    }

    /// Line lengths in samples, early bank first.
    pub fn line_lengths(&self) -> Vec<usize> {
        self.early.iter().chain(self.late.iter()).map(|t| t.line.len()).collect()
    }
}

impl Effect for ReverbEffect {
    fn kind(&self) -> EffectKind { EffectKind::Reverb }

    fn is_enabled(&self) -> bool { self.enabled }
    fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    fn render(&mut self, block: &mut AudioBlock) {
        let out_channels = block.channels;
        block.downmix_to_mono();
        let n = block.samples.len();
        let input = &block.samples;

        self.early_sum.clear();
        self.early_sum.resize(n, 0.0);
        self.late_sum.clear();
        self.late_sum.resize(n, 0.0);

        let room = self.room_size;
        for tap in self.early.iter_mut() {
            tap.ensure_len(n);
            let scale = tap.gain * room;
            for (k, acc) in self.early_sum.iter_mut().enumerate() {
                *acc += tap.line.exchange(k, input[k]) * scale;
            }
            tap.line.advance_by(n);
        }

        let damp = 1.0 - self.damping;
        for tap in self.late.iter_mut() {
            tap.ensure_len(n);
            let scale = tap.gain * room;
            for (k, acc) in self.late_sum.iter_mut().enumerate() {
                let fed = input[k] + self.early_sum[k] * EARLY_TO_LATE;
                *acc += tap.line.exchange(k, fed) * damp * scale;
            }
            tap.line.advance_by(n);
        }

        let mix = self.mix;
        for (k, s) in block.samples.iter_mut().enumerate() {
            let wet = self.early_sum[k] + self.late_sum[k];
            *s = ((1.0 - mix) * *s + mix * wet).clamp(-1.0, 1.0);
        }

        block.expand_mono(out_channels);
    }

    fn reset(&mut self) {
        for tap in self.early.iter_mut().chain(self.late.iter_mut()) {
            tap.line.clear();
        }
    }

    fn param_specs(&self) -> &'static [ParamSpec] { &PARAMS }

    fn get_parameter(&self, name: &str) -> Option<f32> {
        match name {
            "roomSize" => Some(self.room_size),
            "damping"  => Some(self.damping),
            "mix"      => Some(self.mix),
            _ => None,
        }
    }

    fn write_parameter(&mut self, name: &'static str, value: f32) {
        match name {
            "roomSize" => self.room_size = value,
            "damping"  => self.damping = value,
            "mix"      => self.mix = value,
            _ => {}
        }
    }
}
