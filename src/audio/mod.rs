use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};

use crate::audio_api::{AudioCommand, AudioSource, Clock, ToneGenerator, VoiceTrigger};
use crate::error::RhythmError;

mod analyser;
mod engine;
mod frame;
mod voice;

pub use analyser::{Analyser, DEFAULT_FFT_SIZE};
pub use frame::StereoFrame;

use engine::Engine;

/// Owns the device streams. The output stream is the audio clock; the input
/// stream only exists between `acquire` and `release`.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    clock: Arc<AtomicU64>,
    sample_rate: cpal::SampleRate,
    host: cpal::Host,
    analyser: Analyser,
    _output_stream: cpal::Stream,
    input_stream: Option<cpal::Stream>,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        if self.tx.try_send(cmd).is_err() {
            warn!("audio command queue full, dropping command");
        }
    }
}

impl Clock for AudioHandle {
    fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }
}

impl AudioSource for AudioHandle {
    fn acquire(&mut self) -> Result<(), RhythmError> {
        if self.input_stream.is_some() {
            return Ok(());
        }
        let (input_tx, input_rx) = crossbeam_channel::bounded::<Vec<f32>>(256);
        let stream = build_input_stream(&self.host, self.sample_rate, input_tx)?;
        self.analyser.connect(input_rx);
        self.input_stream = Some(stream);
        info!("microphone acquired");
        Ok(())
    }

    fn release(&mut self) {
        if self.input_stream.take().is_some() {
            self.analyser.disconnect();
            info!("microphone released");
        }
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.analyser.byte_frequency_data(out);
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.analyser.byte_time_domain_data(out);
    }
}

impl ToneGenerator for AudioHandle {
    fn trigger(&mut self, voice: VoiceTrigger) {
        self.send(AudioCommand::Trigger(voice));
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetMasterVolume(volume));
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(4096);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;
    let clock = Arc::new(AtomicU64::new(0));
    info!("output: {channels} channels at {sample_rate} Hz");

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let engine = Engine::new(sample_rate as f32, clock.clone());
            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;

            Ok(AudioHandle {
                tx,
                clock,
                sample_rate,
                host,
                analyser: Analyser::new(DEFAULT_FFT_SIZE),
                _output_stream: output_stream,
                input_stream: None,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(4096);

    let err_fn = |err| warn!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            scratch.clear();
            scratch.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut scratch);

            for (out, f) in data.chunks_exact_mut(channels.max(1)).zip(scratch.iter()) {
                match out {
                    [mono] => *mono = 0.5 * (f.left + f.right),
                    [l, r, rest @ ..] => {
                        *l = f.left;
                        *r = f.right;
                        rest.iter_mut().for_each(|s| *s = 0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// ── Input stream ──────────────────────────────────────────────────

fn build_input_stream(
    host: &cpal::Host,
    target_sample_rate: cpal::SampleRate,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream, RhythmError> {
    let device = host
        .default_input_device()
        .ok_or_else(|| RhythmError::SourceUnavailable("no default input device".into()))?;

    let supported = device.default_input_config().map_err(classify_input_error)?;
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = target_sample_rate;

    let in_channels = (stream_config.channels as usize).max(1);

    let err_fn = |err| warn!("audio input stream error: {err}");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = if in_channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(in_channels)
                        .map(|c| c.iter().sum::<f32>() / in_channels as f32)
                        .collect()
                };
                let _ = tx.try_send(mono);
            },
            err_fn,
            None,
        )
        .map_err(classify_input_error)?;

    stream.play().map_err(classify_input_error)?;
    Ok(stream)
}

// cpal has no dedicated permission error; hosts report it in the message
fn classify_input_error(err: impl std::fmt::Display) -> RhythmError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        RhythmError::PermissionDenied
    } else {
        RhythmError::SourceUnavailable(msg)
    }
}
