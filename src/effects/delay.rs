use std::time::Instant;

use super::{DelayLine, Effect, EffectKind, ParamSpec, TapTempo};
use crate::block::AudioBlock;
use crate::error::ChainError;

pub const PARAMS: [ParamSpec; 3] = [
    ParamSpec::new("delayTime", "Time (s)", 0.05, 1.0, 0.3),
    ParamSpec::new("feedback",  "Feedback", 0.0,  0.9, 0.3),
    ParamSpec::new("mix",       "Mix",      0.0,  1.0, 0.5),
];

/// Feedback echo whose line length is the delay time itself.
///
/// Changing the time resizes the line, keeping the overlapping prefix.  The
/// line reserves room for the longest delay up front, so times within the
/// parameter range never reallocate.
pub struct DelayEffect {
    sample_rate:  f32,
    enabled:      bool,
    delay_time:   f32,
    pub feedback: f32,
    pub mix:      f32,
    line:         DelayLine,
    tap:          TapTempo,
}

impl DelayEffect {
    pub fn new(sample_rate: f32) -> Self {
        let delay_time = PARAMS[0].default;
        Self {
            sample_rate,
            enabled: true,
            delay_time,
            feedback: PARAMS[1].default,
            mix:      PARAMS[2].default,
            line:     DelayLine::with_capacity(
                Self::samples_for(sample_rate, delay_time),
                Self::samples_for(sample_rate, PARAMS[0].max),
            ),
            tap:      TapTempo::new(),
        }
    }

    fn samples_for(sample_rate: f32, seconds: f32) -> usize {
        ((sample_rate * seconds).round() as usize).max(1)
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_time
    }

    /// Current line length in samples.
    pub fn delay_samples(&self) -> usize {
        self.line.len()
    }

    /// Set the delay time and resize the line if its length changes.  When
    /// the new buffer cannot be allocated the previous time and buffer stay.
    pub fn set_delay_time(&mut self, seconds: f32) -> Result<(), ChainError> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ChainError::InvalidParameter { name: "delayTime", value: seconds });
        }
        let target = Self::samples_for(self.sample_rate, seconds);
        if target != self.line.len() {
            self.line.resize(target)?;
            log::debug!("Delay line resized to {} samples", target);
        }
        self.delay_time = seconds;
        Ok(())
    }

    pub fn tap_tempo(&mut self) -> Option<f32> {
        self.tap_tempo_at(Instant::now())
    }

    /// Register a tap at `now`; with two or more recent taps the delay time
    /// follows their mean spacing.  Returns the new delay time if it changed.
    pub fn tap_tempo_at(&mut self, now: Instant) -> Option<f32> {
        let interval = self.tap.tap(now)?;
        let seconds = PARAMS[0].clamp(interval);
        match self.set_delay_time(seconds) {
            Ok(()) => Some(seconds),
            Err(e) => {
                log::error!("Tap tempo resize failed: {}", e);
                None
            }
        }
    }

    pub fn tap_count(&self) -> usize {
        self.tap.tap_count()
    }
}

impl Effect for DelayEffect {
    fn kind(&self) -> EffectKind { EffectKind::Delay }

    fn is_enabled(&self) -> bool { self.enabled }
    fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }

    fn render(&mut self, block: &mut AudioBlock) {
        block.downmix_to_mono();
        let (feedback, mix) = (self.feedback, self.mix);
        for s in block.samples.iter_mut() {
            let x = *s;
            let delayed = self.line.current();
            self.line.write(x + feedback * delayed);
            self.line.advance();
            *s = (1.0 - mix) * x + mix * delayed;
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.tap.clear();
    }

    fn param_specs(&self) -> &'static [ParamSpec] { &PARAMS }

    fn get_parameter(&self, name: &str) -> Option<f32> {
        match name {
            "delayTime" => Some(self.delay_time),
            "feedback"  => Some(self.feedback),
            "mix"       => Some(self.mix),
            _ => None,
        }
    }

    fn write_parameter(&mut self, name: &'static str, value: f32) {
        match name {
            "delayTime" => {
                if let Err(e) = self.set_delay_time(value) {
                    log::error!("Delay time change to {:.3}s failed: {}", value, e);
                }
            }
            "feedback" => self.feedback = value,
            "mix"      => self.mix = value,
            _ => {}
        }
    }
}
