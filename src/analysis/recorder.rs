// Onset recorder: samples the analyser on a cadence while recording and
// keeps every frame loud enough to count as a hit.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::frame::{Frame, FrameAnalyzer};
use crate::audio_api::AudioSource;
use crate::error::RhythmError;

// single-frame time-domain threshold, fine for claps and taps in a quiet room
pub const LOOSE_ONSET_THRESHOLD: f32 = 0.05;
// for noisier rooms / sustained sources
pub const STRICT_ONSET_THRESHOLD: f32 = 0.12;

pub const VELOCITY_GAIN: f32 = 1.5;
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 500;

/// A detected hit, timed relative to the start of its recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    pub time: f64,
    pub frequency_hz: f32,
    pub energy: f32,
    pub velocity: f32,
}

impl Event {
    pub fn new(time: f64, frequency_hz: f32, energy: f32) -> Self {
        Self {
            time,
            frequency_hz,
            energy,
            velocity: (energy * VELOCITY_GAIN).min(1.0),
        }
    }
}

/// How often the recorder pulls a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cadence {
    // every UI tick, roughly the redraw rate
    EveryTick,
    Interval { ms: u64 },
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::Interval { ms: DEFAULT_CAPTURE_INTERVAL_MS }
    }
}

/// Decides which ticks of the host loop are capture ticks.
/// Driven by the audio clock so tests can step it by hand.
#[derive(Clone, Debug)]
pub struct Ticker {
    cadence: Cadence,
    next_due: f64,
}

impl Ticker {
    pub fn new(cadence: Cadence) -> Self {
        Self { cadence, next_due: 0.0 }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    // the first interval tick lands one full interval after `now`
    pub fn reset(&mut self, now: f64) {
        self.next_due = match self.cadence {
            Cadence::EveryTick => now,
            Cadence::Interval { ms } => now + ms as f64 / 1000.0,
        };
    }

    pub fn due(&mut self, now: f64) -> bool {
        match self.cadence {
            Cadence::EveryTick => true,
            Cadence::Interval { ms } => {
                if now < self.next_due {
                    return false;
                }
                // skipped intervals are dropped, not replayed in a burst
                let period = (ms.max(1)) as f64 / 1000.0;
                while self.next_due <= now {
                    self.next_due += period;
                }
                true
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

pub struct Recorder {
    state: RecorderState,
    threshold: f32,
    ticker: Ticker,
    epoch: f64,
    events: Vec<Event>,
    analyzer: Option<FrameAnalyzer>,
    last_frame: Option<Frame>,
    last_elapsed: f64,
}

impl Recorder {
    pub fn new(threshold: f32, cadence: Cadence) -> Self {
        Self {
            state: RecorderState::Idle,
            threshold,
            ticker: Ticker::new(cadence),
            epoch: 0.0,
            events: Vec::new(),
            analyzer: None,
            last_frame: None,
            last_elapsed: 0.0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame
    }

    pub fn elapsed(&self) -> f64 {
        self.last_elapsed
    }

    /// Acquires the source and clears the previous take.
    /// On failure the recorder stays idle and keeps its old buffer.
    pub fn start(&mut self, source: &mut impl AudioSource) -> Result<(), RhythmError> {
        if self.is_recording() {
            return Err(RhythmError::AlreadyRecording);
        }
        source.acquire()?;

        self.analyzer = Some(FrameAnalyzer::for_source(source));
        self.events.clear();
        self.last_frame = None;
        self.last_elapsed = 0.0;
        self.epoch = source.current_time();
        self.ticker.reset(self.epoch);
        self.state = RecorderState::Recording;
        info!("recording started (threshold {:.3}, {:?})", self.threshold, self.ticker.cadence());
        Ok(())
    }

    /// Runs one host-loop tick. Returns the event appended on this tick, if any.
    /// Ticks after `stop` are no-ops.
    pub fn tick(&mut self, source: &mut impl AudioSource) -> Option<Event> {
        if !self.is_recording() {
            return None;
        }
        let now = source.current_time();
        if !self.ticker.due(now) {
            return None;
        }
        let analyzer = self.analyzer.as_mut()?;
        let frame = analyzer.capture(source);
        self.last_frame = Some(frame);
        self.last_elapsed = round_to(now - self.epoch, 2);

        if frame.energy_rms <= self.threshold {
            return None;
        }
        let event = Event::new(
            self.last_elapsed,
            frame.dominant_frequency_hz.round(),
            round_to(frame.energy_rms as f64, 3) as f32,
        );
        // times are rounded to centiseconds; two hits in one bucket keep the first
        if self.events.last().is_some_and(|last| event.time <= last.time) {
            debug!("dropping hit at {:.2}s, same slot as previous", event.time);
            return None;
        }
        self.events.push(event);
        Some(event)
    }

    /// Halts capture and releases the source. The take stays available.
    pub fn stop(&mut self, source: &mut impl AudioSource) -> &[Event] {
        if self.is_recording() {
            source.release();
            self.state = RecorderState::Idle;
            info!("recording stopped with {} hits", self.events.len());
        }
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_fixture::FakeAudio;

    #[test]
    fn test_velocity_is_capped() {
        assert!((Event::new(0.0, 220.0, 0.2).velocity - 0.3).abs() < 1e-6);
        assert_eq!(Event::new(0.0, 220.0, 0.9).velocity, 1.0);
    }

    #[test]
    fn test_interval_ticker_skips_missed_periods() {
        let mut t = Ticker::new(Cadence::Interval { ms: 500 });
        t.reset(10.0);
        assert!(!t.due(10.2));
        assert!(t.due(10.5));
        assert!(!t.due(10.6));
        // a long stall fires once, then waits for the next boundary
        assert!(t.due(12.2));
        assert!(!t.due(12.4));
        assert!(t.due(12.5));
    }

    #[test]
    fn test_every_tick_always_due() {
        let mut t = Ticker::new(Cadence::EveryTick);
        t.reset(0.0);
        assert!(t.due(0.0));
        assert!(t.due(0.001));
    }

    #[test]
    fn test_start_fails_when_source_missing() {
        let mut audio = FakeAudio::new();
        audio.unavailable = true;
        let mut rec = Recorder::new(LOOSE_ONSET_THRESHOLD, Cadence::EveryTick);
        let err = rec.start(&mut audio).unwrap_err();
        assert!(matches!(err, RhythmError::SourceUnavailable(_)));
        assert!(!rec.is_recording());
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut audio = FakeAudio::new();
        let mut rec = Recorder::new(LOOSE_ONSET_THRESHOLD, Cadence::EveryTick);
        rec.start(&mut audio).unwrap();
        assert_eq!(rec.start(&mut audio), Err(RhythmError::AlreadyRecording));
        assert!(rec.is_recording());
    }

    #[test]
    fn test_hits_above_threshold_are_timed_from_epoch() {
        let mut audio = FakeAudio::new();
        audio.now = 3.0;
        let mut rec = Recorder::new(LOOSE_ONSET_THRESHOLD, Cadence::Interval { ms: 500 });
        rec.start(&mut audio).unwrap();

        for (i, amp) in [0.5, 0.01, 0.5].into_iter().enumerate() {
            audio.now = 3.0 + 0.5 * (i + 1) as f64;
            audio.set_tone(amp, 20);
            rec.tick(&mut audio);
        }

        let events = rec.stop(&mut audio);
        assert_eq!(events.len(), 2);
        assert!((events[0].time - 0.5).abs() < 1e-9);
        assert!((events[1].time - 1.5).abs() < 1e-9);
        assert!(events[0].energy > LOOSE_ONSET_THRESHOLD);
        assert!(!audio.acquired);
    }

    #[test]
    fn test_strict_threshold_ignores_quiet_hits() {
        let mut audio = FakeAudio::new();
        let mut rec = Recorder::new(STRICT_ONSET_THRESHOLD, Cadence::EveryTick);
        rec.start(&mut audio).unwrap();
        audio.now = 0.1;
        audio.set_tone(0.08, 20);
        assert!(rec.tick(&mut audio).is_none());
        assert!(rec.last_frame().is_some());
        audio.now = 0.2;
        audio.set_tone(0.3, 20);
        assert!(rec.tick(&mut audio).is_some());
    }

    #[test]
    fn test_stray_tick_after_stop_is_ignored() {
        let mut audio = FakeAudio::new();
        let mut rec = Recorder::new(LOOSE_ONSET_THRESHOLD, Cadence::EveryTick);
        rec.start(&mut audio).unwrap();
        audio.now = 0.1;
        audio.set_tone(0.5, 20);
        rec.tick(&mut audio);
        rec.stop(&mut audio);

        audio.now = 0.2;
        audio.set_tone(0.5, 20);
        assert!(rec.tick(&mut audio).is_none());
        assert_eq!(rec.events().len(), 1);
    }

    #[test]
    fn test_restart_clears_previous_take() {
        let mut audio = FakeAudio::new();
        let mut rec = Recorder::new(LOOSE_ONSET_THRESHOLD, Cadence::EveryTick);
        rec.start(&mut audio).unwrap();
        audio.now = 0.1;
        audio.set_tone(0.5, 20);
        rec.tick(&mut audio);
        rec.stop(&mut audio);
        assert_eq!(rec.events().len(), 1);

        rec.start(&mut audio).unwrap();
        assert!(rec.events().is_empty());
    }
}
