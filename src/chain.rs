use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::block::AudioBlock;
use crate::effects::{
    ChorusEffect, DelayEffect, DriveEffect, Effect, ParameterValue, ReverbEffect,
};
use crate::error::ChainError;
use crate::external::{BlockProcessor, ExternalStage};

// ── Stage table ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageId { Chorus, Drive, Pedal, Amp, Ir, Delay, Reverb }

impl StageId {
    /// Processing order.  Independent of the order stages were attached in.
    pub const PIPELINE: [StageId; 7] = [
        Self::Chorus,
        Self::Drive,
        Self::Pedal,
        Self::Amp,
        Self::Ir,
        Self::Delay,
        Self::Reverb,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Chorus => "chorus",
            Self::Drive  => "drive",
            Self::Pedal  => "pedal",
            Self::Amp    => "amp",
            Self::Ir     => "ir",
            Self::Delay  => "delay",
            Self::Reverb => "reverb",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Chorus => "Chorus",
            Self::Drive  => "Drive",
            Self::Pedal  => "Pedal (NAM)",
            Self::Amp    => "Amp (NAM)",
            Self::Ir     => "Cabinet IR",
            Self::Delay  => "Delay",
            Self::Reverb => "Reverb",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::PIPELINE.into_iter().find(|id| id.key().eq_ignore_ascii_case(key))
    }

    pub fn is_external(self) -> bool {
        matches!(self, Self::Pedal | Self::Amp | Self::Ir)
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// Owns every stage of the signal path and runs them in `StageId::PIPELINE`
/// order, once per block.
///
/// Each stage carries its own enabled flag.  Stages that are disabled (or
/// external slots with nothing attached) are skipped outright.  Built-in
/// effects start disabled; external slots start enabled and become active
/// once a processor is attached.
pub struct EffectChain {
    sample_rate: f32,
    max_block:   usize,
    pub chorus:  ChorusEffect,
    pub drive:   DriveEffect,
    pub pedal:   ExternalStage,
    pub amp:     ExternalStage,
    pub ir:      ExternalStage,
    pub delay:   DelayEffect,
    pub reverb:  ReverbEffect,
    slots:       Vec<StageId>,
    faults:      [u64; 7],
    /// Mono copy handed to external stages, sized for `max_block` up front.
    scratch:     Vec<f32>,
}

impl EffectChain {
    pub fn new(sample_rate: f32, max_block: usize) -> Self {
        let mut chain = Self {
            sample_rate,
            max_block,
            chorus: ChorusEffect::new(sample_rate),
            drive:  DriveEffect::new(sample_rate),
            pedal:  ExternalStage::model(),
            amp:    ExternalStage::model(),
            ir:     ExternalStage::impulse_response(),
            delay:  DelayEffect::new(sample_rate),
            reverb: ReverbEffect::new(sample_rate),
            slots:  vec![StageId::Chorus, StageId::Drive, StageId::Delay, StageId::Reverb],
            faults: [0; 7],
            scratch: Vec::with_capacity(max_block),
        };
        for id in chain.slots.clone() {
            if let Some(fx) = chain.effect_mut(id) {
                fx.disable();
            }
        }
        chain
    }

    pub fn sample_rate(&self) -> f32 { self.sample_rate }

    pub fn effect(&self, id: StageId) -> Option<&dyn Effect> {
        match id {
            StageId::Chorus => Some(&self.chorus),
            StageId::Drive  => Some(&self.drive),
            StageId::Delay  => Some(&self.delay),
            StageId::Reverb => Some(&self.reverb),
            _ => None,
        }
    }

    pub fn effect_mut(&mut self, id: StageId) -> Option<&mut dyn Effect> {
        match id {
            StageId::Chorus => Some(&mut self.chorus),
            StageId::Drive  => Some(&mut self.drive),
            StageId::Delay  => Some(&mut self.delay),
            StageId::Reverb => Some(&mut self.reverb),
            _ => None,
        }
    }

    pub fn external(&self, id: StageId) -> Option<&ExternalStage> {
        match id {
            StageId::Pedal => Some(&self.pedal),
            StageId::Amp   => Some(&self.amp),
            StageId::Ir    => Some(&self.ir),
            _ => None,
        }
    }

    pub fn external_mut(&mut self, id: StageId) -> Option<&mut ExternalStage> {
        match id {
            StageId::Pedal => Some(&mut self.pedal),
            StageId::Amp   => Some(&mut self.amp),
            StageId::Ir    => Some(&mut self.ir),
            _ => None,
        }
    }

    /// Attached stages in the order they were attached (display only).
    pub fn slots(&self) -> &[StageId] {
        &self.slots
    }

    /// Attach an external processor to `id`, replacing any previous one.
    pub fn attach_processor(
        &mut self,
        id: StageId,
        mut processor: Box<dyn BlockProcessor>,
    ) -> Option<Box<dyn BlockProcessor>> {
        let (sr, max_block) = (self.sample_rate, self.max_block);
        let stage = self.external_mut(id)?;
        processor.prepare(sr, max_block);
        log::info!("Attached {} to {} stage", processor.name(), id.key());
        let previous = stage.attach(processor);
        if !self.slots.contains(&id) {
            self.slots.push(id);
        }
        previous
    }

    pub fn detach_processor(&mut self, id: StageId) -> Option<Box<dyn BlockProcessor>> {
        let previous = self.external_mut(id)?.detach();
        self.slots.retain(|s| *s != id);
        previous
    }

    // ── Enable flags ──────────────────────────────────────────────────────

    pub fn is_enabled(&self, id: StageId) -> bool {
        match self.effect(id) {
            Some(fx) => fx.is_enabled(),
            None => self.external(id).is_some_and(|s| s.is_enabled()),
        }
    }

    /// Whether `id` will transform the next block.
    pub fn is_active(&self, id: StageId) -> bool {
        match self.effect(id) {
            Some(fx) => fx.is_enabled(),
            None => self.external(id).is_some_and(|s| s.is_active()),
        }
    }

    pub fn set_enabled(&mut self, id: StageId, enabled: bool) {
        if let Some(fx) = self.effect_mut(id) {
            fx.set_enabled(enabled);
        } else if let Some(stage) = self.external_mut(id) {
            stage.set_enabled(enabled);
        }
    }

    pub fn toggle_stage(&mut self, id: StageId) -> bool {
        let on = !self.is_enabled(id);
        self.set_enabled(id, on);
        on
    }

    /// Flip the enabled flag of the stage named `name`.  Unknown names are ignored.
    pub fn toggle(&mut self, name: &str) {
        match StageId::from_key(name) {
            Some(id) => { self.toggle_stage(id); }
            None => log::debug!("toggle: unknown stage '{}'", name),
        }
    }

    // ── Parameters ────────────────────────────────────────────────────────

    pub fn stage_parameters(&self, id: StageId) -> Vec<ParameterValue> {
        match self.effect(id) {
            Some(fx) => fx.parameters(),
            None => self.external(id).map(|s| s.parameters()).unwrap_or_default(),
        }
    }

    /// Parameters of the stage named `name`; empty for unknown names.
    pub fn get_parameters(&self, name: &str) -> Vec<ParameterValue> {
        StageId::from_key(name).map(|id| self.stage_parameters(id)).unwrap_or_default()
    }

    /// Current value of one parameter, without building the full table.
    pub fn parameter(&self, id: StageId, param: &str) -> Option<f32> {
        match self.effect(id) {
            Some(fx) => fx.get_parameter(param),
            None => self.external(id).and_then(|s| s.get_parameter(param)),
        }
    }

    pub fn set_stage_parameter(&mut self, id: StageId, param: &str, value: f32) -> bool {
        if let Some(fx) = self.effect_mut(id) {
            fx.set_parameter(param, value)
        } else if let Some(stage) = self.external_mut(id) {
            stage.set_parameter(param, value)
        } else {
            false
        }
    }

    /// Write one parameter, clamped to its range.  Unknown stage or parameter
    /// names and non-finite values are ignored.
    pub fn set_parameter(&mut self, name: &str, param: &str, value: f32) {
        let applied = StageId::from_key(name)
            .map(|id| self.set_stage_parameter(id, param, value))
            .unwrap_or(false);
        if !applied {
            log::debug!("set_parameter: {}.{} = {} not applied", name, param, value);
        }
    }

    pub fn tap_tempo(&mut self) -> Option<f32> {
        self.delay.tap_tempo()
    }

    pub fn tap_tempo_at(&mut self, now: Instant) -> Option<f32> {
        self.delay.tap_tempo_at(now)
    }

    // ── State ─────────────────────────────────────────────────────────────

    pub fn reset_stage(&mut self, id: StageId) {
        if let Some(fx) = self.effect_mut(id) {
            fx.reset();
        }
    }

    pub fn reset(&mut self) {
        for id in StageId::PIPELINE {
            self.reset_stage(id);
        }
    }

    /// Number of blocks on which stage `id` failed and was passed through.
    pub fn fault_count(&self, id: StageId) -> u64 {
        self.faults[id.index()]
    }

    // ── Processing ────────────────────────────────────────────────────────

    pub fn process_block(&mut self, input: &AudioBlock) -> AudioBlock {
        let mut block = input.clone();
        self.process_in_place(&mut block);
        block
    }

    /// Run every active stage over `block` in pipeline order.
    pub fn process_in_place(&mut self, block: &mut AudioBlock) {
        for id in StageId::PIPELINE {
            if !self.is_active(id) {
                continue;
            }
            if let Some(fx) = self.effect_mut(id) {
                fx.process(block);
                continue;
            }
            if let Err(e) = self.run_external(id, block) {
                self.report_fault(id, &e);
            }
        }
    }

    /// External stages see a mono copy of the block.  The block is only
    /// replaced once the stage succeeds; an error or a panic leaves it as it was.
    fn run_external(&mut self, id: StageId, block: &mut AudioBlock) -> Result<(), ChainError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        block.downmix_into(&mut scratch);

        let result = match self.external_mut(id) {
            Some(stage) => panic::catch_unwind(AssertUnwindSafe(|| stage.run(&mut scratch)))
                .unwrap_or_else(|payload| Err(ChainError::Processor(panic_message(payload)))),
            None => Ok(false),
        };
        if let Ok(true) = result {
            block.samples.clear();
            block.samples.extend_from_slice(&scratch);
            block.channels = 1;
        }

        self.scratch = scratch;
        result.map(|_| ())
    }

    fn report_fault(&mut self, id: StageId, err: &ChainError) {
        let count = &mut self.faults[id.index()];
        *count += 1;
        // First failure, then every 1000th, so a broken stage cannot flood the log.
        if *count == 1 || *count % 1000 == 0 {
            log::warn!("{} stage failed ({} times), passing audio through: {}", id.key(), count, err);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_keys_round_trip() {
        for id in StageId::PIPELINE {
            assert_eq!(StageId::from_key(id.key()), Some(id));
        }
        assert_eq!(StageId::from_key("REVERB"), Some(StageId::Reverb));
        assert_eq!(StageId::from_key("flanger"), None);
    }

    #[test]
    fn builtin_stages_start_disabled() {
        let chain = EffectChain::new(44100.0, 1024);
        for id in StageId::PIPELINE {
            assert!(!chain.is_active(id), "{} active at start", id.key());
        }
        assert_eq!(chain.slots(), &[StageId::Chorus, StageId::Drive, StageId::Delay, StageId::Reverb]);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut chain = EffectChain::new(44100.0, 1024);
        chain.toggle("wah");
        chain.set_parameter("wah", "sweep", 1.0);
        chain.set_parameter("drive", "sweep", 1.0);
        assert!(chain.get_parameters("wah").is_empty());
        assert_eq!(chain.get_parameters("drive").len(), 3);
    }

    #[test]
    fn single_parameter_lookup() {
        let mut chain = EffectChain::new(44100.0, 1024);
        chain.set_parameter("reverb", "mix", 0.8);
        assert_eq!(chain.parameter(StageId::Reverb, "mix"), Some(0.8));
        assert_eq!(chain.parameter(StageId::Ir, "volume"), Some(1.0));
        assert_eq!(chain.parameter(StageId::Amp, "volume"), None);
    }

    #[test]
    fn nan_writes_leave_parameters_alone() {
        let mut chain = EffectChain::new(44100.0, 1024);
        chain.set_enabled(StageId::Drive, true);
        chain.set_parameter("drive", "level", f32::NAN);
        chain.set_parameter("ir", "volume", f32::NAN);
        assert_eq!(chain.parameter(StageId::Drive, "level"), Some(1.0));
        assert_eq!(chain.parameter(StageId::Ir, "volume"), Some(1.0));

        let out = chain.process_block(&AudioBlock::mono(vec![0.5; 4]));
        assert!(out.samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn ir_volume_is_exposed() {
        let mut chain = EffectChain::new(44100.0, 1024);
        chain.set_parameter("ir", "volume", 1.5);
        let params = chain.get_parameters("ir");
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].value, 1.5);
        assert_eq!((params[0].min, params[0].max), (0.0, 2.0));
    }
}
