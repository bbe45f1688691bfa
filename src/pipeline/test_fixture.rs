// Purely for testing: a stand-in for the audio device with a hand-stepped
// clock, a scripted analyser snapshot, and a log of every voice it was asked to play.

use crate::audio_api::{AudioSource, Clock, ToneGenerator, VoiceTrigger};
use crate::error::RhythmError;

pub struct FakeAudio {
    pub now: f64,
    pub sample_rate: f32,
    pub fft_size: usize,
    pub unavailable: bool,
    pub denied: bool,
    pub acquired: bool,
    pub freq_bytes: Vec<u8>,
    pub time_bytes: Vec<u8>,
    pub triggered: Vec<VoiceTrigger>,
    pub master_volume: f32,
}

impl FakeAudio {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            sample_rate: 48000.0,
            fft_size: 2048,
            unavailable: false,
            denied: false,
            acquired: false,
            freq_bytes: vec![0; 1024],
            time_bytes: vec![128; 2048],
            triggered: Vec::new(),
            master_volume: 1.0,
        }
    }

    /// Replaces the current snapshot with a square wave of `amplitude` (0..1)
    /// whose loudest spectral bin is `bin`.
    pub fn set_tone(&mut self, amplitude: f32, bin: usize) {
        let swing = (amplitude.clamp(0.0, 1.0) * 128.0).round() as i32;
        self.time_bytes = (0..self.fft_size)
            .map(|i| {
                let v = if i % 2 == 0 { 128 - swing } else { 128 + swing };
                v.clamp(0, 255) as u8
            })
            .collect();
        self.freq_bytes = vec![0; self.fft_size / 2];
        if bin < self.freq_bytes.len() {
            self.freq_bytes[bin] = 200;
        }
    }

    pub fn set_silence(&mut self) {
        self.time_bytes = vec![128; self.fft_size];
        self.freq_bytes = vec![0; self.fft_size / 2];
    }
}

impl Clock for FakeAudio {
    fn current_time(&self) -> f64 {
        self.now
    }
}

impl AudioSource for FakeAudio {
    fn acquire(&mut self) -> Result<(), RhythmError> {
        if self.denied {
            return Err(RhythmError::PermissionDenied);
        }
        if self.unavailable {
            return Err(RhythmError::SourceUnavailable("no input device".into()));
        }
        self.acquired = true;
        Ok(())
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let n = out.len().min(self.freq_bytes.len());
        out[..n].copy_from_slice(&self.freq_bytes[..n]);
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        let n = out.len().min(self.time_bytes.len());
        out[..n].copy_from_slice(&self.time_bytes[..n]);
    }
}

impl ToneGenerator for FakeAudio {
    fn trigger(&mut self, voice: VoiceTrigger) {
        self.triggered.push(voice);
    }

    fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume;
    }
}
