// rusttuiamp - real-time guitar effects chain
//
// Chorus, drive, delay and reverb around pluggable neural-model and
// impulse-response stages, processed block by block on the audio thread.
// Uses cpal for audio I/O, hound for WAV files and rtrb rings to hand live
// input and control commands to the output callback.

pub mod audio;
pub mod audio_file;
pub mod block;
pub mod chain;
pub mod config;
pub mod control;
pub mod effects;
pub mod error;
pub mod external;
pub mod ir;
pub mod nam;

pub use audio::AudioEngine;
pub use block::AudioBlock;
pub use chain::{EffectChain, StageId};
pub use control::{ChainCommand, ChainController, ChainEngine, ChainEvent, ChainSnapshot};
pub use effects::{Effect, EffectKind, ParamSpec, ParameterValue};
pub use error::ChainError;
pub use external::{BlockProcessor, ExternalStage};
pub use ir::ImpulseResponse;
pub use nam::{ModelInfo, NamFile};
