use crate::effects::{EffectKind, ParamSpec, ParameterValue};
use crate::error::ChainError;

/// A processor whose algorithm lives outside the chain: neural amp models
/// and impulse-response convolution.
///
/// `process` runs synchronously on the audio thread and transforms a mono
/// buffer in place, so the block length is preserved by construction.  When
/// it returns an error (or panics) the chain throws away whatever was written
/// and passes the block through untouched.
pub trait BlockProcessor: Send {
    fn name(&self) -> &str;

    /// Called once when the processor is attached to a chain.
    fn prepare(&mut self, _sample_rate: f32, _max_block: usize) {}

    fn process(&mut self, buffer: &mut [f32]) -> Result<(), ChainError>;
}

pub const IR_PARAMS: [ParamSpec; 1] = [
    ParamSpec::new("volume", "Volume", 0.0, 2.0, 1.0),
];

/// Chain slot for an external processor: empty until one is attached.
pub struct ExternalStage {
    kind:      EffectKind,
    enabled:   bool,
    processor: Option<Box<dyn BlockProcessor>>,
    /// Post-stage gain, only exposed on the impulse-response slot.
    volume:    f32,
}

impl ExternalStage {
    pub fn model() -> Self {
        Self { kind: EffectKind::ExternalModel, enabled: true, processor: None, volume: 1.0 }
    }

    pub fn impulse_response() -> Self {
        Self { kind: EffectKind::ExternalIR, enabled: true, processor: None, volume: IR_PARAMS[0].default }
    }

    pub fn is_enabled(&self) -> bool { self.enabled }
    pub fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    /// Enabled and holding a processor.
    pub fn is_active(&self) -> bool {
        self.enabled && self.processor.is_some()
    }

    pub fn processor_name(&self) -> Option<&str> {
        self.processor.as_deref().map(|p| p.name())
    }

    pub fn attach(&mut self, processor: Box<dyn BlockProcessor>) -> Option<Box<dyn BlockProcessor>> {
        self.processor.replace(processor)
    }

    pub fn detach(&mut self) -> Option<Box<dyn BlockProcessor>> {
        self.processor.take()
    }

    pub fn param_specs(&self) -> &'static [ParamSpec] {
        match self.kind {
            EffectKind::ExternalIR => &IR_PARAMS,
            _ => &[],
        }
    }

    pub fn get_parameter(&self, name: &str) -> Option<f32> {
        self.param_specs().iter().find(|p| p.name == name).map(|_| self.volume)
    }

    pub fn parameters(&self) -> Vec<ParameterValue> {
        self.param_specs().iter().map(|spec| ParameterValue::from_spec(spec, self.volume)).collect()
    }

    /// Clamped write; `false` for unknown names and non-finite values.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> bool {
        match self.param_specs().iter().find(|p| p.name == name) {
            Some(spec) if value.is_finite() => {
                self.volume = spec.clamp(value);
                true
            }
            _ => false,
        }
    }

    /// Run the attached processor over `buffer` in place.  `Ok(false)` means
    /// there is nothing attached and `buffer` was left alone.
    pub fn run(&mut self, buffer: &mut [f32]) -> Result<bool, ChainError> {
        let Some(processor) = self.processor.as_mut() else { return Ok(false) };
        processor.process(buffer)?;
        if self.kind == EffectKind::ExternalIR && self.volume != 1.0 {
            let v = self.volume;
            buffer.iter_mut().for_each(|s| *s *= v);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Halve;
    impl BlockProcessor for Halve {
        fn name(&self) -> &str { "halve" }
        fn process(&mut self, buffer: &mut [f32]) -> Result<(), ChainError> {
            buffer.iter_mut().for_each(|s| *s *= 0.5);
            Ok(())
        }
    }

    #[test]
    fn empty_slot_is_inactive() {
        let mut stage = ExternalStage::model();
        assert!(!stage.is_active());
        let mut buf = [1.0];
        assert!(!stage.run(&mut buf).unwrap());
        assert_eq!(buf, [1.0]);
    }

    #[test]
    fn ir_volume_applies_after_processor() {
        let mut stage = ExternalStage::impulse_response();
        stage.attach(Box::new(Halve));
        assert!(stage.set_parameter("volume", 2.0));
        let mut buf = [0.4, -0.4];
        assert!(stage.run(&mut buf).unwrap());
        assert_eq!(buf, [0.4, -0.4]);
    }

    #[test]
    fn model_slot_has_no_parameters() {
        let mut stage = ExternalStage::model();
        assert!(stage.parameters().is_empty());
        assert!(!stage.set_parameter("volume", 0.5));
        assert_eq!(stage.get_parameter("volume"), None);
    }

    #[test]
    fn ir_volume_refuses_nan() {
        let mut stage = ExternalStage::impulse_response();
        assert!(stage.set_parameter("volume", 0.5));
        assert!(!stage.set_parameter("volume", f32::NAN));
        assert_eq!(stage.get_parameter("volume"), Some(0.5));
    }

    #[test]
    fn detach_empties_the_slot() {
        let mut stage = ExternalStage::model();
        stage.attach(Box::new(Halve));
        assert_eq!(stage.processor_name(), Some("halve"));
        assert!(stage.detach().is_some());
        assert!(!stage.is_active());
    }
}
