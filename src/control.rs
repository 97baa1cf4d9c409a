//! Lock-free link between the control surface and the audio callback.
//!
//! The callback owns the chain through `ChainEngine` and drains queued
//! commands at the top of every block.  The control side keeps a
//! `ChainSnapshot` that it updates from events the engine sends back, so
//! drawing the UI never touches the chain itself.

use std::time::Instant;

use crate::block::AudioBlock;
use crate::chain::{EffectChain, StageId};
use crate::effects::ParameterValue;

/// Commands sent from the control thread to the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChainCommand {
    /// Flip a stage's enabled flag
    Toggle(StageId),
    /// Write one parameter (clamped by the stage)
    SetParameter { stage: StageId, param: &'static str, value: f32 },
    /// Register a tap-tempo tap taken at the given instant
    TapTempo(Instant),
    /// Clear a stage's buffers and tap memory
    Reset(StageId),
}

/// Events sent from the audio thread back to the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChainEvent {
    Enabled { stage: StageId, enabled: bool },
    /// Value actually stored after a parameter write
    Parameter { stage: StageId, param: &'static str, value: f32 },
    Tapped { taps: usize, delay_time: Option<f32> },
    /// An external stage failed `count` times so far
    Fault { stage: StageId, count: u64 },
}

/// Create a linked controller/engine pair around `chain`.
pub fn link(chain: EffectChain, capacity: usize) -> (ChainController, ChainEngine) {
    let (command_tx, command_rx) = rtrb::RingBuffer::new(capacity);
    let (event_tx, event_rx) = rtrb::RingBuffer::new(capacity);
    let snapshot = ChainSnapshot::capture(&chain);
    let controller = ChainController { command_tx, event_rx, snapshot };
    let engine = ChainEngine { chain, command_rx, event_tx, faults_seen: [0; 7] };
    (controller, engine)
}

// ── Audio side ────────────────────────────────────────────────────────────────

/// Audio-thread half: the chain plus the ends of both rings.
pub struct ChainEngine {
    chain:       EffectChain,
    command_rx:  rtrb::Consumer<ChainCommand>,
    event_tx:    rtrb::Producer<ChainEvent>,
    faults_seen: [u64; 7],
}

impl ChainEngine {
    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    /// Apply pending commands, then run the chain over `block`.
    pub fn process(&mut self, block: &mut AudioBlock) {
        self.handle_commands();
        self.chain.process_in_place(block);
        self.report_faults();
    }

    /// Apply every queued command.
    pub fn handle_commands(&mut self) {
        while let Ok(cmd) = self.command_rx.pop() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: ChainCommand) {
        match cmd {
            ChainCommand::Toggle(stage) => {
                let enabled = self.chain.toggle_stage(stage);
                self.send(ChainEvent::Enabled { stage, enabled });
            }
            ChainCommand::SetParameter { stage, param, value } => {
                self.chain.set_stage_parameter(stage, param, value);
                // Report the stored value, which differs from `value` when
                // it was clamped or refused.
                if let Some(value) = self.chain.parameter(stage, param) {
                    self.send(ChainEvent::Parameter { stage, param, value });
                }
            }
            ChainCommand::TapTempo(at) => {
                let delay_time = self.chain.tap_tempo_at(at);
                let taps = self.chain.delay.tap_count();
                self.send(ChainEvent::Tapped { taps, delay_time });
                if let Some(value) = delay_time {
                    self.send(ChainEvent::Parameter { stage: StageId::Delay, param: "delayTime", value });
                }
            }
            ChainCommand::Reset(stage) => self.chain.reset_stage(stage),
        }
    }

    fn report_faults(&mut self) {
        for (i, stage) in StageId::PIPELINE.into_iter().enumerate() {
            let count = self.chain.fault_count(stage);
            if count != self.faults_seen[i] {
                self.faults_seen[i] = count;
                self.send(ChainEvent::Fault { stage, count });
            }
        }
    }

    fn send(&mut self, event: ChainEvent) {
        // A full ring means the control side stopped reading; its snapshot
        // goes stale but audio keeps flowing.
        let _ = self.event_tx.push(event);
    }
}

// ── Control side ──────────────────────────────────────────────────────────────

/// Control-thread half: queues commands and mirrors the chain's state.
pub struct ChainController {
    command_tx: rtrb::Producer<ChainCommand>,
    event_rx:   rtrb::Consumer<ChainEvent>,
    snapshot:   ChainSnapshot,
}

impl ChainController {
    /// Queue a command.  Returns `false` if the ring is full.
    pub fn send(&mut self, cmd: ChainCommand) -> bool {
        match self.command_tx.push(cmd) {
            Ok(()) => true,
            Err(_) => {
                log::warn!("Command queue full, dropped {:?}", cmd);
                false
            }
        }
    }

    pub fn toggle(&mut self, stage: StageId) -> bool {
        self.send(ChainCommand::Toggle(stage))
    }

    pub fn set_parameter(&mut self, stage: StageId, param: &'static str, value: f32) -> bool {
        self.send(ChainCommand::SetParameter { stage, param, value })
    }

    pub fn tap_tempo(&mut self) -> bool {
        self.send(ChainCommand::TapTempo(Instant::now()))
    }

    pub fn reset(&mut self, stage: StageId) -> bool {
        self.send(ChainCommand::Reset(stage))
    }

    /// Fold every event the engine has sent into the snapshot and return them.
    pub fn sync(&mut self) -> Vec<ChainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.pop() {
            self.snapshot.apply(&event);
            events.push(event);
        }
        events
    }

    pub fn snapshot(&self) -> &ChainSnapshot {
        &self.snapshot
    }

    /// Re-read the whole state, after the chain was changed directly.
    pub fn refresh(&mut self, chain: &EffectChain) {
        self.snapshot = ChainSnapshot::capture(chain);
    }
}

/// What the control surface knows about one stage.
#[derive(Clone, Debug, PartialEq)]
pub struct StageState {
    pub id:        StageId,
    pub enabled:   bool,
    pub active:    bool,
    pub processor: Option<String>,
    pub params:    Vec<ParameterValue>,
    pub faults:    u64,
}

/// Control-side copy of the chain state, one entry per stage in pipeline order.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainSnapshot {
    stages: Vec<StageState>,
}

impl ChainSnapshot {
    pub fn capture(chain: &EffectChain) -> Self {
        let stages = StageId::PIPELINE
            .iter()
            .map(|&id| StageState {
                id,
                enabled:   chain.is_enabled(id),
                active:    chain.is_active(id),
                processor: chain.external(id).and_then(|s| s.processor_name()).map(str::to_string),
                params:    chain.stage_parameters(id),
                faults:    chain.fault_count(id),
            })
            .collect();
        Self { stages }
    }

    pub fn stages(&self) -> &[StageState] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> Option<&StageState> {
        self.stages.iter().find(|s| s.id == id)
    }

    fn stage_mut(&mut self, id: StageId) -> Option<&mut StageState> {
        self.stages.iter_mut().find(|s| s.id == id)
    }

    pub fn apply(&mut self, event: &ChainEvent) {
        match *event {
            ChainEvent::Enabled { stage, enabled } => {
                if let Some(s) = self.stage_mut(stage) {
                    s.enabled = enabled;
                    s.active = enabled && (!stage.is_external() || s.processor.is_some());
                }
            }
            ChainEvent::Parameter { stage, param, value } => {
                if let Some(p) = self
                    .stage_mut(stage)
                    .and_then(|s| s.params.iter_mut().find(|p| p.name == param))
                {
                    p.value = value;
                }
            }
            ChainEvent::Fault { stage, count } => {
                if let Some(s) = self.stage_mut(stage) {
                    s.faults = count;
                }
            }
            ChainEvent::Tapped { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;
    use crate::external::BlockProcessor;
    use std::time::Duration;

    struct Broken;
    impl BlockProcessor for Broken {
        fn name(&self) -> &str { "broken" }
        fn process(&mut self, _buffer: &mut [f32]) -> Result<(), ChainError> {
            Err(ChainError::Processor("no backend".into()))
        }
    }

    fn param(snapshot: &ChainSnapshot, id: StageId, name: &str) -> f32 {
        snapshot.stage(id)
            .and_then(|s| s.params.iter().find(|p| p.name == name))
            .map(|p| p.value)
            .unwrap()
    }

    #[test]
    fn snapshot_starts_from_chain() {
        let (controller, _engine) = link(EffectChain::new(44100.0, 256), 16);
        let snap = controller.snapshot();
        assert_eq!(snap.stages().len(), StageId::PIPELINE.len());
        assert!(!snap.stage(StageId::Drive).unwrap().enabled);
        assert!(snap.stage(StageId::Ir).unwrap().enabled);
        assert!(!snap.stage(StageId::Ir).unwrap().active);
        assert_eq!(param(snap, StageId::Delay, "delayTime"), 0.3);
    }

    #[test]
    fn commands_take_effect_on_next_block() {
        let (mut controller, mut engine) = link(EffectChain::new(44100.0, 256), 16);
        assert!(controller.toggle(StageId::Drive));
        assert!(controller.set_parameter(StageId::Drive, "level", 0.5));
        assert!(!engine.chain().is_enabled(StageId::Drive));

        let mut block = AudioBlock::mono(vec![1.0; 8]);
        engine.process(&mut block);
        assert!(engine.chain().is_enabled(StageId::Drive));
        let expected = (5.0f32).tanh() * 0.8 * 0.5;
        assert!((block.samples[0] - expected).abs() < 1e-6);

        let events = controller.sync();
        assert_eq!(events.len(), 2);
        let snap = controller.snapshot();
        assert!(snap.stage(StageId::Drive).unwrap().active);
        assert_eq!(param(snap, StageId::Drive, "level"), 0.5);
    }

    #[test]
    fn snapshot_reports_stored_value() {
        let (mut controller, mut engine) = link(EffectChain::new(44100.0, 256), 16);
        controller.set_parameter(StageId::Chorus, "rate", 50.0);
        controller.set_parameter(StageId::Ir, "volume", f32::NAN);
        engine.handle_commands();
        controller.sync();
        assert_eq!(param(controller.snapshot(), StageId::Chorus, "rate"), 5.0);
        assert_eq!(param(controller.snapshot(), StageId::Ir, "volume"), 1.0);
    }

    #[test]
    fn taps_update_delay_time() {
        let (mut controller, mut engine) = link(EffectChain::new(44100.0, 256), 16);
        let t0 = Instant::now();
        controller.send(ChainCommand::TapTempo(t0));
        controller.send(ChainCommand::TapTempo(t0 + Duration::from_millis(250)));
        engine.handle_commands();

        let events = controller.sync();
        assert!(events.contains(&ChainEvent::Tapped { taps: 1, delay_time: None }));
        assert!(events.iter().any(|e| matches!(e, ChainEvent::Tapped { taps: 2, delay_time: Some(_) })));
        assert!((param(controller.snapshot(), StageId::Delay, "delayTime") - 0.25).abs() < 1e-4);
        assert_eq!(engine.chain().delay.delay_samples(), 11025);
    }

    #[test]
    fn faults_are_reported_once_per_change() {
        let mut chain = EffectChain::new(44100.0, 256);
        chain.attach_processor(StageId::Pedal, Box::new(Broken));
        let (mut controller, mut engine) = link(chain, 16);

        let mut block = AudioBlock::mono(vec![0.1; 8]);
        engine.process(&mut block);
        engine.process(&mut block);
        let events = controller.sync();
        assert_eq!(
            events,
            vec![
                ChainEvent::Fault { stage: StageId::Pedal, count: 1 },
                ChainEvent::Fault { stage: StageId::Pedal, count: 2 },
            ]
        );
        assert_eq!(controller.snapshot().stage(StageId::Pedal).unwrap().faults, 2);
    }

    #[test]
    fn blocks_keep_processing_while_commands_stream_in() {
        let mut chain = EffectChain::new(44100.0, 64);
        chain.set_enabled(StageId::Drive, true);
        let (mut controller, mut engine) = link(chain, 64);

        let audio = std::thread::spawn(move || {
            let mut dry_blocks = 0;
            for _ in 0..500 {
                let mut block = AudioBlock::mono(vec![0.1; 64]);
                engine.process(&mut block);
                if block.samples[0] == 0.1 {
                    dry_blocks += 1;
                }
            }
            (dry_blocks, engine)
        });
        for i in 0..200 {
            controller.set_parameter(StageId::Drive, "level", 0.5 + (i % 10) as f32 * 0.05);
            controller.sync();
        }

        let (dry_blocks, mut engine) = audio.join().unwrap();
        assert_eq!(dry_blocks, 0);
        engine.handle_commands();
        let level = engine.chain().parameter(StageId::Drive, "level").unwrap();
        assert!((0.5..1.0).contains(&level), "level {}", level);
    }

    #[test]
    fn full_queue_refuses_commands() {
        let (mut controller, _engine) = link(EffectChain::new(44100.0, 256), 2);
        assert!(controller.reset(StageId::Delay));
        assert!(controller.reset(StageId::Delay));
        assert!(!controller.reset(StageId::Delay));
    }

    #[test]
    fn refresh_picks_up_direct_changes() {
        let (mut controller, mut engine) = link(EffectChain::new(44100.0, 256), 16);
        engine.chain_mut().set_parameter("reverb", "mix", 0.9);
        assert_eq!(param(controller.snapshot(), StageId::Reverb, "mix"), 0.3);
        controller.refresh(engine.chain());
        assert_eq!(param(controller.snapshot(), StageId::Reverb, "mix"), 0.9);
    }
}
