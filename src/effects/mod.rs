pub mod chorus;
pub mod delay;
pub mod delay_line;
pub mod drive;
pub mod reverb;
pub mod tap_tempo;

pub use chorus::ChorusEffect;
pub use delay::DelayEffect;
pub use delay_line::DelayLine;
pub use drive::DriveEffect;
pub use reverb::ReverbEffect;
pub use tap_tempo::TapTempo;

use crate::block::AudioBlock;

// ── Effect identity ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind { Chorus, Drive, Delay, Reverb, ExternalModel, ExternalIR }

impl EffectKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Chorus        => "Chorus",
            Self::Drive         => "Drive",
            Self::Delay         => "Delay",
            Self::Reverb        => "Reverb",
            Self::ExternalModel => "Neural Model",
            Self::ExternalIR    => "Impulse Response",
        }
    }
}

// ── Parameter tables ──────────────────────────────────────────────────────────

/// Declared range and default of one named effect parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name:    &'static str,
    pub label:   &'static str,
    pub min:     f32,
    pub max:     f32,
    pub default: f32,
}

impl ParamSpec {
    pub const fn new(name: &'static str, label: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self { name, label, min, max, default }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

pub fn find_spec(specs: &'static [ParamSpec], name: &str) -> Option<&'static ParamSpec> {
    specs.iter().find(|p| p.name == name)
}

/// Snapshot of a parameter as reported to a control surface.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterValue {
    pub name:  &'static str,
    pub label: &'static str,
    pub value: f32,
    pub min:   f32,
    pub max:   f32,
}

impl ParameterValue {
    pub fn from_spec(spec: &ParamSpec, value: f32) -> Self {
        Self { name: spec.name, label: spec.label, value, min: spec.min, max: spec.max }
    }

    /// Increment used by the control surface: one twentieth of the range.
    pub fn step(&self) -> f32 {
        (self.max - self.min) / 20.0
    }

    /// Position of `value` within the range, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.max > self.min { ((self.value - self.min) / (self.max - self.min)).clamp(0.0, 1.0) } else { 0.0 }
    }
}

// ── Effect contract ───────────────────────────────────────────────────────────

/// Block-based audio effect with its own enable flag and parameter table.
///
/// All implementations must be `Send` so they can live inside the audio
/// thread.  Processing is in place: an effect may change the block's channel
/// layout (chorus, drive and delay downmix to mono; reverb restores the input
/// channel count) but never touches a block while disabled.
pub trait Effect: Send {
    fn kind(&self) -> EffectKind;

    fn name(&self) -> &'static str { self.kind().name() }

    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    fn enable(&mut self)  { self.set_enabled(true); }
    fn disable(&mut self) { self.set_enabled(false); }
    fn toggle(&mut self)  { let on = self.is_enabled(); self.set_enabled(!on); }

    /// Identity while disabled, otherwise the effect's own transform.
    fn process(&mut self, block: &mut AudioBlock) {
        if self.is_enabled() {
            self.render(block);
        }
    }

    /// The effect's transform, applied regardless of the enable flag.
    fn render(&mut self, block: &mut AudioBlock);

    /// Clear buffers, phase and tap memory.  Parameters and the enable flag stay.
    fn reset(&mut self);

    fn param_specs(&self) -> &'static [ParamSpec];

    fn get_parameter(&self, name: &str) -> Option<f32>;

    /// Store an already range-checked value.  Called only with names taken
    /// from `param_specs`.
    fn write_parameter(&mut self, name: &'static str, value: f32);

    /// Set a named parameter, clamped to its declared range.  Returns `false`
    /// (and changes nothing) for unknown names and non-finite values.
    fn set_parameter(&mut self, name: &str, value: f32) -> bool {
        match find_spec(self.param_specs(), name) {
            Some(spec) if value.is_finite() => {
                self.write_parameter(spec.name, spec.clamp(value));
                true
            }
            _ => false,
        }
    }

    fn parameters(&self) -> Vec<ParameterValue> {
        self.param_specs()
            .iter()
            .map(|spec| ParameterValue::from_spec(spec, self.get_parameter(spec.name).unwrap_or(spec.default)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_effects(sr: f32) -> Vec<Box<dyn Effect>> {
        vec![
            Box::new(ChorusEffect::new(sr)),
            Box::new(DriveEffect::new(sr)),
            Box::new(DelayEffect::new(sr)),
            Box::new(ReverbEffect::new(sr)),
        ]
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| ((i as f32) * 0.37).sin() * 2.5).collect()
    }

    #[test]
    fn disabled_effects_are_identity() {
        for mut fx in all_effects(44100.0) {
            fx.disable();
            let input = AudioBlock::interleaved(ramp(512), 2);
            let mut block = input.clone();
            fx.process(&mut block);
            assert_eq!(block, input, "{} altered a block while disabled", fx.name());
        }
    }

    #[test]
    fn toggle_does_not_touch_parameters() {
        for mut fx in all_effects(48000.0) {
            let before = fx.parameters();
            fx.toggle();
            assert!(!fx.is_enabled());
            fx.toggle();
            assert!(fx.is_enabled());
            assert_eq!(fx.parameters(), before);
        }
    }

    #[test]
    fn set_parameter_clamps_and_ignores_unknown() {
        let mut fx = ChorusEffect::new(44100.0);
        assert!(fx.set_parameter("rate", 50.0));
        assert_eq!(fx.get_parameter("rate"), Some(5.0));
        assert!(fx.set_parameter("depth", -1.0));
        assert_eq!(fx.get_parameter("depth"), Some(0.0001));
        assert!(!fx.set_parameter("feedback", 0.5));
        assert_eq!(fx.get_parameter("feedback"), None);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        for mut fx in all_effects(44100.0) {
            let before = fx.parameters();
            for p in &before {
                assert!(!fx.set_parameter(p.name, f32::NAN), "{} took NaN", p.name);
                assert!(!fx.set_parameter(p.name, f32::INFINITY), "{} took inf", p.name);
            }
            assert_eq!(fx.parameters(), before);
        }
    }

    #[test]
    fn drive_stays_bounded_after_nan_level() {
        let mut fx = DriveEffect::new(44100.0);
        fx.set_parameter("level", f32::NAN);
        let mut block = AudioBlock::mono(vec![0.5; 4]);
        fx.process(&mut block);
        assert!(block.samples.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
    }

    #[test]
    fn reset_keeps_enable_flag_and_parameters() {
        for mut fx in all_effects(44100.0) {
            fx.disable();
            let spec = fx.param_specs()[0];
            fx.set_parameter(spec.name, spec.max);
            fx.reset();
            assert!(!fx.is_enabled());
            assert_eq!(fx.get_parameter(spec.name), Some(spec.max));
        }
    }
}
