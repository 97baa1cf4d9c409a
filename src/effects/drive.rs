use super::{Effect, EffectKind, ParamSpec};
use crate::block::AudioBlock;

pub const PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("drive", "Drive", 1.0, 10.0, 5.0),
    ParamSpec::new("tone",  "Tone",  0.0, 1.0,  0.2),
    ParamSpec::new("level", "Level", 0.0, 1.0,  1.0),
];

/// `tanh` soft clipper followed by a one-pole smoothing filter and an output
/// level, hard-limited to `[-1, 1]`.
///
/// The tone filter's memory starts from zero on every block, so there is no
/// state carried between calls and `reset` has nothing to clear.
pub struct DriveEffect {
    enabled:   bool,
    pub drive: f32,
    pub tone:  f32,
    pub level: f32,
}

impl DriveEffect {
    pub fn new(_sample_rate: f32) -> Self {
        Self {
            enabled: true,
            drive:   PARAMS[0].default,
            tone:    PARAMS[1].default,
            level:   PARAMS[2].default,
        }
    }
}

impl Effect for DriveEffect {
    fn kind(&self) -> EffectKind { EffectKind::Drive }

    fn is_enabled(&self) -> bool { self.enabled }
    fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    fn render(&mut self, block: &mut AudioBlock) {
        block.downmix_to_mono();
        let (drive, tone, level) = (self.drive, self.tone, self.level);
        let mut last = 0.0f32;
        for s in block.samples.iter_mut() {
            let driven = (*s * drive).tanh();
            let filtered = tone * last + (1.0 - tone) * driven;
            last = filtered;
            *s = (filtered * level).clamp(-1.0, 1.0);
        }
    }

    fn reset(&mut self) {}

    fn param_specs(&self) -> &'static [ParamSpec] { &PARAMS }

    fn get_parameter(&self, name: &str) -> Option<f32> {
        match name {
            "drive" => Some(self.drive),
            "tone"  => Some(self.tone),
            "level" => Some(self.level),
            _ => None,
        }
    }

    fn write_parameter(&mut self, name: &'static str, value: f32) {
        match name {
            "drive" => self.drive = value,
            "tone"  => self.tone = value,
            "level" => self.level = value,
            _ => {}
        }
    }
}
