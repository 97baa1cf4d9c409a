use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SizedSample, Stream, StreamConfig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio_file::AudioFile;
use crate::block::AudioBlock;
use crate::chain::EffectChain;
use crate::control::{self, ChainController, ChainEngine};

/// Largest device period the preallocated callback blocks are sized for.
const MAX_PERIOD_SAMPLES: usize = 16384;
/// Slots in each direction of the control/audio command ring.
const COMMAND_CAPACITY: usize = 256;

// ── Engine ────────────────────────────────────────────────────────────────────

enum Mode {
    Idle,
    Playing { _stream: Stream, finished: Arc<AtomicBool> },
    Monitoring { _input: Stream, _output: Stream },
}

/// Owns the output device and whichever stream(s) currently feed it.
///
/// File playback and live monitoring both need the device to themselves, so
/// starting either one stops the other first.
///
/// While a stream runs its callback is the only thing that locks the chain;
/// the control side talks to it through the `ChainController` command ring.
/// Direct access via `configure` is only allowed while idle, so the lock the
/// callback takes is never contended.
pub struct AudioEngine {
    host:       cpal::Host,
    device:     cpal::Device,
    config:     cpal::SupportedStreamConfig,
    engine:     Arc<Mutex<ChainEngine>>,
    controller: ChainController,
    block_size: usize,
    mode:       Mode,
}

impl AudioEngine {
    pub fn new(block_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output device found")?;

        let config = device
            .default_output_config()
            .context("No default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        log::info!(
            "Output device: {} @ {} Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "<unknown>".into()),
            sample_rate,
            config.channels(),
            config.sample_format()
        );

        let (controller, engine) = control::link(EffectChain::new(sample_rate, block_size), COMMAND_CAPACITY);

        Ok(Self {
            host,
            device,
            config,
            engine: Arc::new(Mutex::new(engine)),
            controller,
            block_size,
            mode: Mode::Idle,
        })
    }

    pub fn controller(&self) -> &ChainController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ChainController {
        &mut self.controller
    }

    /// Change the chain directly (attach processors, initial settings).
    /// Refused while a stream is running.
    pub fn configure<R>(&mut self, f: impl FnOnce(&mut EffectChain) -> R) -> Result<R> {
        if !matches!(self.mode, Mode::Idle) {
            anyhow::bail!("Stop playback or monitoring before reconfiguring the chain");
        }
        let mut engine = lock_engine(&self.engine);
        engine.handle_commands();
        self.controller.sync();
        let out = f(engine.chain_mut());
        self.controller.refresh(engine.chain());
        Ok(out)
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate().0 as f32
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.mode, Mode::Playing { .. })
    }

    pub fn is_monitoring(&self) -> bool {
        matches!(self.mode, Mode::Monitoring { .. })
    }

    /// Drop the playback stream once the file has run out, and apply queued
    /// commands while no callback is there to do it.  Returns `true` when
    /// playback finished on this call.
    pub fn poll(&mut self) -> bool {
        let done = match &self.mode {
            Mode::Playing { finished, .. } => finished.load(Ordering::Acquire),
            _ => false,
        };
        if done {
            self.mode = Mode::Idle;
            log::info!("Playback finished");
        }
        if matches!(self.mode, Mode::Idle) {
            lock_engine(&self.engine).handle_commands();
        }
        done
    }

    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Playing { .. }    => log::info!("Playback stopped"),
            Mode::Monitoring { .. } => log::info!("Monitoring stopped"),
            Mode::Idle => {}
        }
    }

    /// Play a WAV file through the chain.
    pub fn start_playback<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = AudioFile::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let file = match_rate(file, self.config.sample_rate().0);
        log::info!("Playing {} ({:.1}s)", path.display(), file.duration_secs());

        self.stop();
        let finished = Arc::new(AtomicBool::new(false));
        let source = PlaybackSource { file, pos: 0, finished: Arc::clone(&finished) };
        let stream = self.build_output(Feed::File(source))?;
        stream.play().context("Failed to start audio stream")?;
        self.mode = Mode::Playing { _stream: stream, finished };
        Ok(())
    }

    /// Route the default input device through the chain to the output.
    pub fn start_monitoring(&mut self) -> Result<()> {
        self.stop();

        let input = self.host
            .default_input_device()
            .context("No input device found")?;
        let in_config = input
            .default_input_config()
            .context("No default input config")?;
        if in_config.sample_rate() != self.config.sample_rate() {
            log::warn!(
                "Input runs at {} Hz, output at {} Hz",
                in_config.sample_rate().0, self.config.sample_rate().0
            );
        }

        let (producer, consumer) = rtrb::RingBuffer::<f32>::new(self.block_size * 8);
        let in_channels = in_config.channels() as usize;
        let stream_config: StreamConfig = in_config.config();
        let in_stream = match in_config.sample_format() {
            cpal::SampleFormat::F32 => build_input::<f32>(&input, &stream_config, producer, in_channels)?,
            cpal::SampleFormat::I16 => build_input::<i16>(&input, &stream_config, producer, in_channels)?,
            cpal::SampleFormat::U16 => build_input::<u16>(&input, &stream_config, producer, in_channels)?,
            fmt => anyhow::bail!("Unsupported input sample format: {:?}", fmt),
        };
        let out_stream = self.build_output(Feed::Live(consumer))?;

        in_stream.play().context("Failed to start input stream")?;
        out_stream.play().context("Failed to start output stream")?;
        log::info!("Monitoring started");
        self.mode = Mode::Monitoring { _input: in_stream, _output: out_stream };
        Ok(())
    }

    fn build_output(&self, feed: Feed) -> Result<Stream> {
        let channels = self.config.channels() as usize;
        let engine = Arc::clone(&self.engine);
        let config: StreamConfig = self.config.config();
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => build_output::<f32>(&self.device, &config, engine, feed, channels)?,
            cpal::SampleFormat::I16 => build_output::<i16>(&self.device, &config, engine, feed, channels)?,
            cpal::SampleFormat::U16 => build_output::<u16>(&self.device, &config, engine, feed, channels)?,
            fmt => anyhow::bail!("Unsupported sample format: {:?}", fmt),
        };
        Ok(stream)
    }
}

fn lock_engine(engine: &Mutex<ChainEngine>) -> MutexGuard<'_, ChainEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bring a decoded file to the device rate so it plays at the right speed.
fn match_rate(file: AudioFile, device_rate: u32) -> AudioFile {
    if file.sample_rate == device_rate {
        return file;
    }
    log::info!("Resampling playback file from {} Hz to {} Hz", file.sample_rate, device_rate);
    file.resampled(device_rate)
}

// ── Sources ───────────────────────────────────────────────────────────────────

struct PlaybackSource {
    file:     AudioFile,
    pos:      usize,
    finished: Arc<AtomicBool>,
}

enum Feed {
    File(PlaybackSource),
    Live(rtrb::Consumer<f32>),
}

impl Feed {
    /// Fill `block` with up to `frames` frames of source audio.
    fn pull(&mut self, block: &mut AudioBlock, frames: usize) {
        match self {
            Feed::File(src) => {
                let ch = src.file.channels;
                let end = (src.pos + frames * ch).min(src.file.data.len());
                block.fill_from(&src.file.data[src.pos..end], ch);
                src.pos = end;
                if src.pos >= src.file.data.len() {
                    src.finished.store(true, Ordering::Release);
                }
            }
            Feed::Live(consumer) => {
                block.samples.clear();
                block.channels = 1;
                let available = consumer.slots().min(frames);
                for _ in 0..available {
                    match consumer.pop() {
                        Ok(s) => block.samples.push(s),
                        Err(_) => break,
                    }
                }
                // Underrun: pad with silence rather than stall the device.
                block.samples.resize(frames, 0.0);
            }
        }
    }
}

// ── Stream builders ───────────────────────────────────────────────────────────

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    engine: Arc<Mutex<ChainEngine>>,
    mut feed: Feed,
    channels: usize,
) -> Result<Stream>
where
    T: cpal::Sample + SizedSample + cpal::FromSample<f32>,
{
    let err_fn = |err| log::error!("Audio stream error: {}", err);
    let mut block = AudioBlock::with_capacity(MAX_PERIOD_SAMPLES);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            feed.pull(&mut block, frames);

            lock_engine(&engine).process(&mut block);

            write_frames(data, channels, &block);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn build_input<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: rtrb::Producer<f32>,
    channels: usize,
) -> Result<Stream>
where
    T: cpal::Sample + SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_fn = |err| log::error!("Input stream error: {}", err);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
                // A full ring means the output side stalled; drop the newest input.
                if producer.push(sum / frame.len() as f32).is_err() {
                    break;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Copy a processed block into an interleaved device buffer.  Mono blocks fan
/// out to every channel; missing frames are written as silence.
fn write_frames<T>(data: &mut [T], channels: usize, block: &AudioBlock)
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    let src_ch = block.channels;
    let src_frames = block.frames();
    for (frame, out) in data.chunks_mut(channels).enumerate() {
        for (ch, slot) in out.iter_mut().enumerate() {
            let value = if frame < src_frames {
                block.samples[frame * src_ch + ch.min(src_ch - 1)]
            } else {
                0.0
            };
            *slot = T::from_sample(value);
        }
    }
}
