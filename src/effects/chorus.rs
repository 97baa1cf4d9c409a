use std::f32::consts::PI;

use super::{DelayLine, Effect, EffectKind, ParamSpec};
use crate::block::AudioBlock;

const BUFFER_SECONDS: f32 = 0.1;

pub const PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("rate",  "Rate (Hz)",  0.1,    5.0,  1.0),
    ParamSpec::new("depth", "Depth (s)",  0.0001, 0.01, 0.002),
    ParamSpec::new("mix",   "Mix",        0.0,    1.0,  0.5),
];

/// Short delay line swept by a sine LFO, mixed against the dry signal.
pub struct ChorusEffect {
    sample_rate: f32,
    enabled:     bool,
    pub rate:    f32,
    pub depth:   f32,
    pub mix:     f32,
    line:        DelayLine,
    /// Sample counter driving the LFO, wraps at one second.
    phase:       u32,
    phase_wrap:  u32,
}

impl ChorusEffect {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            enabled:    true,
            rate:       PARAMS[0].default,
            depth:      PARAMS[1].default,
            mix:        PARAMS[2].default,
            line:       DelayLine::with_duration(BUFFER_SECONDS, sample_rate),
            phase:      0,
            phase_wrap: (sample_rate as u32).max(1),
        }
    }

    #[inline]
    fn lfo(&self) -> f32 {
        (2.0 * PI * self.rate * self.phase as f32 / self.sample_rate).sin()
    }

    #[inline]
    fn next_sample(&mut self, x: f32) -> f32 {
        self.line.write(x);
        let lfo = self.lfo();
        let offset = (self.depth * self.sample_rate * (lfo + 1.0) / 2.0) as usize;
        let delayed = self.line.read_back(offset);
        self.line.advance();
        self.phase = (self.phase + 1) % self.phase_wrap;
        (1.0 - self.mix) * x + self.mix * delayed
    }
}

impl Effect for ChorusEffect {
    fn kind(&self) -> EffectKind { EffectKind::Chorus }

    fn is_enabled(&self) -> bool { self.enabled }
    fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    fn render(&mut self, block: &mut AudioBlock) {
        block.downmix_to_mono();
        for s in block.samples.iter_mut() {
            *s = self.next_sample(*s);
        }
    }

    fn reset(&mut self) {
        self.phase = 0;
        self.line.clear();
    }

    fn param_specs(&self) -> &'static [ParamSpec] { &PARAMS }

    fn get_parameter(&self, name: &str) -> Option<f32> {
        match name {
            "rate"  => Some(self.rate),
            "depth" => Some(self.depth),
            "mix"   => Some(self.mix),
            _ => None,
        }
    }

    fn write_parameter(&mut self, name: &'static str, value: f32) {
        match name {
            "rate"  => self.rate = value,
            "depth" => self.depth = value,
            "mix"   => self.mix = value,
            _ => {}
        }
    }
}
