use std::f32::consts::TAU;

use super::frame::{pan_gains, StereoFrame};
use crate::audio_api::{DrumVoice, Instrument, VoiceTrigger};

// silent-frame hits read as 0 Hz; play them at A3 instead
pub const FALLBACK_FREQUENCY_HZ: f32 = 220.0;
const VOICE_LEVEL: f32 = 0.3;
const KICK_CLICK: f32 = 0.4;
const HIHAT_RING_HZ: f32 = 8000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timbre {
    Saw,
    Piano,
    Pluck,
    Bass,
    Pad,
    Drum(DrumVoice),
}

impl Timbre {
    pub fn for_voice(instrument: Instrument, frequency_hz: f32) -> Self {
        match instrument {
            Instrument::Synth => Timbre::Saw,
            Instrument::Piano => Timbre::Piano,
            Instrument::Guitar => Timbre::Pluck,
            Instrument::Bass => Timbre::Bass,
            Instrument::Pad => Timbre::Pad,
            Instrument::Drums => Timbre::Drum(DrumVoice::from_frequency(frequency_hz)),
        }
    }

    // (attack secs, max length secs, decay curve exponent)
    fn shape(self, duration: f32) -> (f32, f32, f32) {
        match self {
            Timbre::Saw => (0.01, duration, 1.5),
            Timbre::Piano => (0.005, duration * 2.0, 3.0),
            Timbre::Pluck => (0.002, duration * 1.5, 4.0),
            Timbre::Bass => (0.01, duration, 1.0),
            Timbre::Pad => (duration * 0.4, duration * 2.5, 1.0),
            Timbre::Drum(DrumVoice::Kick) => (0.001, duration.min(0.35), 2.0),
            Timbre::Drum(DrumVoice::Snare) => (0.001, duration.min(0.2), 3.0),
            Timbre::Drum(DrumVoice::HiHat) => (0.0005, duration.min(0.08), 4.0),
        }
    }
}

/// One sounding note. Renders itself sample by sample until its envelope closes.
#[derive(Clone, Debug)]
pub struct Voice {
    pub active: bool,
    timbre: Timbre,
    freq: f32,
    amp: f32,
    gain_l: f32,
    gain_r: f32,
    phase: f32,
    phase2: f32,
    sample_rate: f32,
    elapsed: u32,
    attack: u32,
    length: u32,
    curve: f32,
    last_noise: f32,
}

impl Voice {
    pub fn new(t: &VoiceTrigger, sample_rate: f32) -> Self {
        let freq = if t.frequency_hz > 0.0 { t.frequency_hz } else { FALLBACK_FREQUENCY_HZ };
        let timbre = Timbre::for_voice(t.instrument, t.frequency_hz);
        let (attack, length, curve) = timbre.shape(t.duration.max(0.01));
        let (gain_l, gain_r) = pan_gains(t.pan);
        let length = ((length * sample_rate) as u32).max(1);

        Self {
            active: true,
            timbre,
            freq,
            amp: t.velocity.clamp(0.0, 1.0) * VOICE_LEVEL,
            gain_l,
            gain_r,
            phase: 0.0,
            phase2: 0.0,
            sample_rate,
            elapsed: 0,
            attack: ((attack * sample_rate) as u32).min(length - 1),
            length,
            curve,
            last_noise: 0.0,
        }
    }

    #[cfg(test)]
    pub fn timbre(&self) -> Timbre {
        self.timbre
    }

    pub fn progress(&self) -> f32 {
        self.elapsed as f32 / self.length as f32
    }

    fn envelope(&self) -> f32 {
        if self.elapsed < self.attack {
            return self.elapsed as f32 / self.attack.max(1) as f32;
        }
        let tail = (self.length - self.attack).max(1) as f32;
        let left = 1.0 - (self.elapsed - self.attack) as f32 / tail;
        left.max(0.0).powf(self.curve)
    }

    fn advance(phase: &mut f32, freq: f32, sample_rate: f32) {
        *phase += freq / sample_rate;
        if *phase >= 1.0 {
            let whole = phase.floor();
            *phase -= whole;
        }
    }

    fn oscillate(&mut self) -> f32 {
        let t = self.elapsed as f32 / self.sample_rate;
        let sr = self.sample_rate;
        match self.timbre {
            Timbre::Saw => {
                let s = 2.0 * self.phase - 1.0;
                Self::advance(&mut self.phase, self.freq, sr);
                s
            }
            Timbre::Piano => {
                let p = self.phase * TAU;
                let s = p.sin() + 0.4 * (2.0 * p).sin() + 0.15 * (3.0 * p).sin();
                Self::advance(&mut self.phase, self.freq, sr);
                s * 0.65
            }
            Timbre::Pluck => {
                // triangle
                let s = 1.0 - 4.0 * (self.phase - 0.5).abs();
                Self::advance(&mut self.phase, self.freq, sr);
                s
            }
            Timbre::Bass => {
                let square = if self.phase < 0.5 { 0.6 } else { -0.6 };
                let sub = (self.phase2 * TAU).sin();
                Self::advance(&mut self.phase, self.freq, sr);
                Self::advance(&mut self.phase2, self.freq * 0.5, sr);
                square + 0.5 * sub
            }
            Timbre::Pad => {
                let s = (self.phase * TAU).sin() + (self.phase2 * TAU).sin();
                Self::advance(&mut self.phase, self.freq * 1.003, sr);
                Self::advance(&mut self.phase2, self.freq * 0.997, sr);
                s * 0.5
            }
            Timbre::Drum(DrumVoice::Kick) => {
                // pitch drops from 150 Hz towards 50 Hz, with a noise click on the beater
                let f = 50.0 + 100.0 * (-t * 30.0).exp();
                let s = (self.phase * TAU).sin();
                Self::advance(&mut self.phase, f, sr);
                s + KICK_CLICK * white_noise() * (-t * 150.0).exp()
            }
            Timbre::Drum(DrumVoice::Snare) => {
                let body = (self.phase * TAU).sin();
                Self::advance(&mut self.phase, 180.0, sr);
                0.7 * white_noise() + 0.3 * body
            }
            Timbre::Drum(DrumVoice::HiHat) => {
                // first difference of white noise tilts it towards the top end
                let n = white_noise();
                let hiss = n - self.last_noise;
                self.last_noise = n;
                // metallic ring from a square partial kept under nyquist
                let ring = if self.phase < 0.5 { 1.0 } else { -1.0 };
                Self::advance(&mut self.phase, HIHAT_RING_HZ.min(sr * 0.45), sr);
                0.35 * hiss + 0.3 * ring
            }
        }
    }

    pub fn next_frame(&mut self) -> StereoFrame {
        if !self.active {
            return StereoFrame::zero();
        }
        let s = self.oscillate() * self.envelope() * self.amp;
        self.elapsed += 1;
        if self.elapsed >= self.length {
            self.active = false;
        }
        StereoFrame { left: s * self.gain_l, right: s * self.gain_r }
    }
}

fn white_noise() -> f32 {
    rand::random::<f32>() * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(v: &mut Voice, out: &mut [StereoFrame]) {
        for frame in out.iter_mut() {
            if !v.active {
                break;
            }
            *frame = v.next_frame();
        }
    }

    fn trigger(instrument: Instrument, frequency_hz: f32) -> VoiceTrigger {
        VoiceTrigger { instrument, frequency_hz, velocity: 1.0, start_time: 0.0, duration: 0.4, pan: 0.0 }
    }

    #[test]
    fn test_drum_band_selection() {
        assert_eq!(DrumVoice::from_frequency(100.0), DrumVoice::Kick);
        assert_eq!(DrumVoice::from_frequency(300.0), DrumVoice::Snare);
        assert_eq!(DrumVoice::from_frequency(1000.0), DrumVoice::HiHat);
        assert_eq!(DrumVoice::from_frequency(150.0), DrumVoice::Snare);
        assert_eq!(DrumVoice::from_frequency(400.0), DrumVoice::HiHat);
        assert_eq!(DrumVoice::from_frequency(149.9), DrumVoice::Kick);
    }

    #[test]
    fn test_drum_timbre_follows_frequency() {
        let v = Voice::new(&trigger(Instrument::Drums, 320.0), 48000.0);
        assert_eq!(v.timbre(), Timbre::Drum(DrumVoice::Snare));
        let v = Voice::new(&trigger(Instrument::Bass, 320.0), 48000.0);
        assert_eq!(v.timbre(), Timbre::Bass);
    }

    #[test]
    fn test_voice_ends_after_its_length() {
        let mut v = Voice::new(&trigger(Instrument::Synth, 440.0), 1000.0);
        let mut buf = vec![StereoFrame::zero(); 1000];
        render(&mut v, &mut buf);
        assert!(!v.active);
        // 0.4s at 1 kHz
        assert!(buf[399].left.abs() <= 1.0);
        assert_eq!(buf[400], StereoFrame::zero());
    }

    #[test]
    fn test_output_is_bounded_and_audible() {
        for instrument in Instrument::ALL {
            let mut v = Voice::new(&trigger(instrument, 0.0), 8000.0);
            let mut buf = vec![StereoFrame::zero(); 8000];
            render(&mut v, &mut buf);
            let peak = buf.iter().map(|f| f.left.abs().max(f.right.abs())).fold(0.0, f32::max);
            assert!(peak > 0.0, "{instrument:?} was silent");
            assert!(peak <= 1.0, "{instrument:?} peaked at {peak}");
        }
    }

    #[test]
    fn test_hard_pan_is_one_sided() {
        let mut t = trigger(Instrument::Piano, 440.0);
        t.pan = 1.0;
        let mut v = Voice::new(&t, 8000.0);
        let mut buf = vec![StereoFrame::zero(); 800];
        render(&mut v, &mut buf);
        assert!(buf.iter().all(|f| f.left.abs() < 1e-6));
        assert!(buf.iter().any(|f| f.right.abs() > 0.01));
    }

    fn render_drum(frequency_hz: f32, frames: usize) -> Vec<f32> {
        let mut v = Voice::new(&trigger(Instrument::Drums, frequency_hz), 48000.0);
        let mut buf = vec![StereoFrame::zero(); frames];
        render(&mut v, &mut buf);
        buf.iter().map(|f| f.left).collect()
    }

    #[test]
    fn test_kick_click_is_only_at_the_attack() {
        let a = render_drum(100.0, 3000);
        let b = render_drum(100.0, 3000);
        // the noise click makes two hits differ at the start
        let head: f32 = a[..240].iter().zip(&b[..240]).map(|(x, y)| (x - y).abs()).sum();
        assert!(head > 0.01, "no click: {head}");
        // the sweep underneath is the same every time
        for (x, y) in a[2400..].iter().zip(&b[2400..]) {
            assert!((x - y).abs() < 1e-3);
        }
    }

    #[test]
    fn test_hihat_has_a_tonal_partial() {
        let a = render_drum(1000.0, 3840);
        let b = render_drum(1000.0, 3840);
        // pure noise hits would be uncorrelated; the ring partial is shared
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let norm = (a.iter().map(|x| x * x).sum::<f32>() * b.iter().map(|y| y * y).sum::<f32>()).sqrt();
        assert!(dot / norm > 0.3, "correlation {}", dot / norm);
        assert!(a.iter().all(|s| s.abs() <= 1.0));
    }
}
