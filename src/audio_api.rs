use serde::{Deserialize, Serialize};

use crate::error::RhythmError;

// Synthesis voices a track can be rendered with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    #[default]
    Synth,
    Piano,
    Guitar,
    Bass,
    Drums,
    Pad,
}

impl Instrument {
    pub const ALL: [Instrument; 6] = [
        Instrument::Synth,
        Instrument::Piano,
        Instrument::Guitar,
        Instrument::Bass,
        Instrument::Drums,
        Instrument::Pad,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Instrument::Synth => "synth",
            Instrument::Piano => "piano",
            Instrument::Guitar => "guitar",
            Instrument::Bass => "bass",
            Instrument::Drums => "drums",
            Instrument::Pad => "pad",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|i| *i == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Drum sound picked from an event's dominant frequency.
///
/// Bands are half-open: `[0,150)` kick, `[150,400)` snare, `[400,∞)` hihat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrumVoice {
    Kick,
    Snare,
    HiHat,
}

impl DrumVoice {
    pub const SNARE_FROM_HZ: f32 = 150.0;
    pub const HIHAT_FROM_HZ: f32 = 400.0;

    pub fn from_frequency(frequency_hz: f32) -> Self {
        if frequency_hz < Self::SNARE_FROM_HZ {
            DrumVoice::Kick
        } else if frequency_hz < Self::HIHAT_FROM_HZ {
            DrumVoice::Snare
        } else {
            DrumVoice::HiHat
        }
    }
}

// One voice to start at an absolute time on the audio clock
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceTrigger {
    pub instrument: Instrument,
    pub frequency_hz: f32,
    pub velocity: f32, // 0..1
    pub start_time: f64, // seconds, audio clock
    pub duration: f32, // seconds
    pub pan: f32, // -1..1
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // Queued by the engine and started once its clock reaches `start_time`.
    // There is no way to cancel a trigger after it has been sent.
    Trigger(VoiceTrigger),
    SetMasterVolume(f32),
}

/// The running audio clock, in seconds.
pub trait Clock {
    fn current_time(&self) -> f64;
}

/// Microphone access plus analyser-style snapshots of the most recent input.
pub trait AudioSource: Clock {
    fn acquire(&mut self) -> Result<(), RhythmError>;
    fn release(&mut self);
    fn sample_rate(&self) -> f32;
    fn fft_size(&self) -> usize;
    /// Fills `out` (fft_size / 2 bins) with byte magnitudes.
    fn byte_frequency_data(&mut self, out: &mut [u8]);
    /// Fills `out` (fft_size samples) with bytes centred on 128.
    fn byte_time_domain_data(&mut self, out: &mut [u8]);
}

/// Fire-and-forget synthesis backend.
pub trait ToneGenerator {
    fn trigger(&mut self, voice: VoiceTrigger);
    fn set_master_volume(&mut self, volume: f32);
}
