use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::frame::StereoFrame;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, VoiceTrigger};

const MAX_VOICES: usize = 64; // hard cap so we wont malloc in audio callback
const MAX_PENDING: usize = 4096;

#[derive(Clone, Copy, Debug)]
struct Pending {
    start_frame: u64,
    trigger: VoiceTrigger,
}

/// Realtime side of the audio device: starts queued voices on time and mixes them.
/// The number of frames rendered so far is published as the audio clock.
pub struct Engine {
    sample_rate: f32,
    voices: Vec<Voice>,
    pending: Vec<Pending>, // sorted by start_frame
    master_gain: f32,
    frames_rendered: u64,
    clock: Arc<AtomicU64>,
}

impl Engine {
    pub fn new(sample_rate: f32, clock: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate,
            voices: Vec::with_capacity(MAX_VOICES),
            pending: Vec::with_capacity(MAX_PENDING),
            master_gain: 0.8,
            frames_rendered: clock.load(Ordering::Relaxed),
            clock,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger(t) => self.schedule(t),
            AudioCommand::SetMasterVolume(v) => self.master_gain = v.clamp(0.0, 1.0),
        }
    }

    fn schedule(&mut self, trigger: VoiceTrigger) {
        if self.pending.len() >= MAX_PENDING {
            return;
        }
        let start_frame = (trigger.start_time.max(0.0) * self.sample_rate as f64).round() as u64;
        let at = self.pending.partition_point(|p| p.start_frame <= start_frame);
        self.pending.insert(at, Pending { start_frame, trigger });
    }

    fn start_voice(&mut self, trigger: &VoiceTrigger) {
        let voice = Voice::new(trigger, self.sample_rate);
        if self.voices.len() < MAX_VOICES {
            self.voices.push(voice);
            return;
        }
        // pool full: replace the voice closest to finishing
        if let Some(slot) = self
            .voices
            .iter_mut()
            .max_by(|a, b| a.progress().total_cmp(&b.progress()))
        {
            *slot = voice;
        }
    }

    #[cfg(test)]
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    pub fn pending_triggers(&self) -> usize {
        self.pending.len()
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            let now = self.frames_rendered;
            let due = self.pending.partition_point(|p| p.start_frame <= now);
            for i in 0..due {
                let trigger = self.pending[i].trigger;
                self.start_voice(&trigger);
            }
            if due > 0 {
                self.pending.drain(..due);
            }

            let mut mix = StereoFrame::zero();
            for v in &mut self.voices {
                let s = v.next_frame();
                mix.left += s.left;
                mix.right += s.right;
            }
            self.voices.retain(|v| v.active);

            frame.left = (mix.left * self.master_gain).clamp(-1.0, 1.0);
            frame.right = (mix.right * self.master_gain).clamp(-1.0, 1.0);
            self.frames_rendered += 1;
        }
        self.clock.store(self.frames_rendered, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_api::Instrument;

    fn trigger_at(start_time: f64) -> VoiceTrigger {
        VoiceTrigger {
            instrument: Instrument::Synth,
            frequency_hz: 440.0,
            velocity: 1.0,
            start_time,
            duration: 0.1,
            pan: 0.0,
        }
    }

    #[test]
    fn test_voices_start_on_their_frame() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut engine = Engine::new(1000.0, clock.clone());
        engine.handle_cmd(AudioCommand::Trigger(trigger_at(0.05)));
        engine.handle_cmd(AudioCommand::Trigger(trigger_at(0.02)));

        let mut block = vec![StereoFrame::zero(); 30];
        engine.render_block(&mut block);
        assert_eq!(clock.load(Ordering::Relaxed), 30);
        assert!(block[..20].iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(engine.pending_triggers(), 1);
        assert_eq!(engine.active_voices(), 1);

        engine.render_block(&mut block);
        assert_eq!(engine.pending_triggers(), 0);
    }

    #[test]
    fn test_late_triggers_start_immediately() {
        let clock = Arc::new(AtomicU64::new(500));
        let mut engine = Engine::new(1000.0, clock);
        engine.handle_cmd(AudioCommand::Trigger(trigger_at(0.1)));
        let mut block = vec![StereoFrame::zero(); 1];
        engine.render_block(&mut block);
        assert_eq!(engine.pending_triggers(), 0);
    }

    #[test]
    fn test_master_volume_zero_silences() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut engine = Engine::new(1000.0, clock);
        engine.handle_cmd(AudioCommand::SetMasterVolume(0.0));
        engine.handle_cmd(AudioCommand::Trigger(trigger_at(0.0)));
        let mut block = vec![StereoFrame::zero(); 10];
        engine.render_block(&mut block);
        assert!(block.iter().all(|f| f.left == 0.0 && f.right == 0.0));
    }

    #[test]
    fn test_pool_is_capped() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut engine = Engine::new(1000.0, clock);
        for _ in 0..(MAX_VOICES + 10) {
            engine.handle_cmd(AudioCommand::Trigger(VoiceTrigger { duration: 1.0, ..trigger_at(0.0) }));
        }
        let mut block = vec![StereoFrame::zero(); 1];
        engine.render_block(&mut block);
        assert_eq!(engine.active_voices(), MAX_VOICES);
    }
}
