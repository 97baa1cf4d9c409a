use std::path::PathBuf;

use rusttuiamp::audio::AudioEngine;
use rusttuiamp::chain::StageId;
use rusttuiamp::control::{ChainEvent, ChainSnapshot, StageState};
use rusttuiamp::nam::ModelInfo;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transport { Idle, Playing, Monitoring }

// ── App state ─────────────────────────────────────────────────────────────────

pub struct App {
    engine:          AudioEngine,
    pub stage:       usize,
    pub param:       usize,
    pub should_quit: bool,
    pub status_msg:  String,
    pub play_path:   Option<PathBuf>,
    pub model_info:  Option<ModelInfo>,
}

impl App {
    pub fn new(engine: AudioEngine, play_path: Option<PathBuf>, model_info: Option<ModelInfo>) -> Self {
        Self {
            engine,
            stage: 0,
            param: 0,
            should_quit: false,
            status_msg: String::new(),
            play_path,
            model_info,
        }
    }

    pub fn selected_stage(&self) -> StageId {
        StageId::PIPELINE[self.stage]
    }

    pub fn sample_rate(&self) -> f32 { self.engine.sample_rate() }

    pub fn transport(&self) -> Transport {
        if self.engine.is_playing() { Transport::Playing }
        else if self.engine.is_monitoring() { Transport::Monitoring }
        else { Transport::Idle }
    }

    /// Chain state as last reported by the audio side.
    pub fn snapshot(&self) -> &ChainSnapshot {
        self.engine.controller().snapshot()
    }

    fn selected_state(&self) -> Option<&StageState> {
        self.snapshot().stage(self.selected_stage())
    }

    fn param_count(&self) -> usize {
        self.selected_state().map_or(0, |s| s.params.len())
    }

    /// Called once per UI frame.
    pub fn tick(&mut self) {
        if self.engine.poll() {
            self.status_msg = "Playback finished".to_string();
        }
        for event in self.engine.controller_mut().sync() {
            match event {
                ChainEvent::Tapped { delay_time: Some(t), .. } => {
                    self.status_msg = format!("Tap: delay {:.0} ms", t * 1000.0);
                }
                ChainEvent::Tapped { taps, delay_time: None } => {
                    self.status_msg = format!("Tap ({})", taps);
                }
                ChainEvent::Fault { stage, count } if count == 1 => {
                    self.status_msg = format!("{} failed, passing audio through", stage.label());
                }
                _ => {}
            }
        }
    }

    // ── Navigation ────────────────────────────────────────────────────────

    pub fn stage_up(&mut self) {
        let n = StageId::PIPELINE.len();
        self.stage = if self.stage == 0 { n - 1 } else { self.stage - 1 };
        self.param = 0;
    }

    pub fn stage_down(&mut self) {
        self.stage = (self.stage + 1) % StageId::PIPELINE.len();
        self.param = 0;
    }

    pub fn param_left(&mut self) {
        let n = self.param_count();
        if n == 0 { return; }
        self.param = if self.param == 0 { n - 1 } else { self.param - 1 };
    }

    pub fn param_right(&mut self) {
        let n = self.param_count();
        if n == 0 { return; }
        self.param = (self.param + 1) % n;
    }

    // ── Stage controls ────────────────────────────────────────────────────

    pub fn toggle_stage(&mut self) {
        let id = self.selected_stage();
        let Some(state) = self.selected_state() else { return };
        let on = !state.enabled;
        let msg = if !on {
            format!("{} off", id.label())
        } else if id.is_external() && state.processor.is_none() {
            format!("{} on (no processor loaded)", id.label())
        } else {
            format!("{} on", id.label())
        };
        if self.engine.controller_mut().toggle(id) {
            self.status_msg = msg;
        }
    }

    fn nudge(&mut self, direction: f32) {
        let id = self.selected_stage();
        let Some(p) = self.selected_state().and_then(|s| s.params.get(self.param)).cloned() else { return };
        // The stage clamps too; doing it here keeps the status line honest
        // before the audio side confirms.
        let target = (p.value + direction * p.step()).clamp(p.min, p.max);
        if self.engine.controller_mut().set_parameter(id, p.name, target) {
            self.status_msg = format!("{} {}: {:.4}", id.label(), p.label, target);
        }
    }

    pub fn param_up(&mut self)   { self.nudge(1.0); }
    pub fn param_down(&mut self) { self.nudge(-1.0); }

    /// The resulting delay time shows up in the status line on the next tick.
    pub fn tap_tempo(&mut self) {
        self.engine.controller_mut().tap_tempo();
    }

    pub fn reset_stage(&mut self) {
        let id = self.selected_stage();
        if self.engine.controller_mut().reset(id) {
            self.status_msg = format!("{} reset", id.label());
        }
    }

    // ── Transport ─────────────────────────────────────────────────────────

    pub fn play(&mut self) {
        let Some(path) = self.play_path.clone() else {
            self.status_msg = "No file to play (start with --play <wav>)".to_string();
            return;
        };
        self.status_msg = match self.engine.start_playback(&path) {
            Ok(()) => format!("Playing {}", path.display()),
            Err(e) => {
                log::error!("Playback failed: {:#}", e);
                format!("Error: {}", e)
            }
        };
    }

    pub fn monitor(&mut self) {
        self.status_msg = match self.engine.start_monitoring() {
            Ok(()) => "Monitoring input".to_string(),
            Err(e) => {
                log::error!("Monitoring failed: {:#}", e);
                format!("Error: {}", e)
            }
        };
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.status_msg = "Stopped".to_string();
    }
}
