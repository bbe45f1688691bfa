// Turns the project's tracks into voice triggers at absolute times on the
// audio clock. Nothing here blocks: a pass hands every voice to the tone
// generator up front, and the host loop calls `tick` to start the next pass.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::project::{Project, Track};
use crate::audio_api::{ToneGenerator, VoiceTrigger};

pub const DEFAULT_VOICE_DURATION_SECS: f32 = 0.4;

/// How a track's event spacing is derived from the master tempo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    // spacing scaled by track tempo / master tempo
    #[default]
    Ensemble,
    // spacing divided by the track's speed percentage
    PerTrack,
}

impl PlaybackMode {
    pub fn toggle(self) -> Self {
        match self {
            PlaybackMode::Ensemble => PlaybackMode::PerTrack,
            PlaybackMode::PerTrack => PlaybackMode::Ensemble,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackMode::Ensemble => "ensemble",
            PlaybackMode::PerTrack => "per-track",
        }
    }
}

pub fn beat_interval_secs(master_bpm: u32) -> f64 {
    60.0 / master_bpm.max(1) as f64
}

/// Seconds from the start of a pass to the `index`-th voice of `track`.
pub fn trigger_offset(mode: PlaybackMode, index: usize, master_bpm: u32, track: &Track) -> f64 {
    let beat = beat_interval_secs(master_bpm);
    let i = index as f64;
    match mode {
        PlaybackMode::Ensemble => i * beat * (track.base_tempo_bpm as f64 / master_bpm.max(1) as f64),
        PlaybackMode::PerTrack => i * beat / track.speed_ratio(),
    }
}

/// One pass covers as many beats as the longest track has events, at master tempo.
pub fn loop_duration_secs(project: &Project) -> f64 {
    project.longest_track_len() as f64 * beat_interval_secs(project.tempo_bpm)
}

/// Every voice one track contributes to a pass starting at `now`. Muted tracks contribute none.
pub fn track_voices(track: &Track, mode: PlaybackMode, master_bpm: u32, now: f64, voice_duration: f32) -> Vec<VoiceTrigger> {
    if track.muted {
        return Vec::new();
    }
    let ratio = track.pitch_ratio();
    let gain = track.gain();
    let pan = track.pan();

    track
        .playback_order()
        .enumerate()
        .map(|(i, event)| VoiceTrigger {
            instrument: track.instrument,
            frequency_hz: event.frequency_hz * ratio,
            velocity: (event.velocity * gain).clamp(0.0, 1.0),
            start_time: now + trigger_offset(mode, i, master_bpm, track),
            duration: voice_duration,
            pan,
        })
        .collect()
}

/// Hands one full pass of the project to `out`. Returns how many voices were sent.
pub fn schedule_pass(project: &Project, mode: PlaybackMode, now: f64, voice_duration: f32, out: &mut impl ToneGenerator) -> usize {
    let mut sent = 0;
    for track in project.tracks() {
        for voice in track_voices(track, mode, project.tempo_bpm, now, voice_duration) {
            out.trigger(voice);
            sent += 1;
        }
    }
    sent
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Idle,
    Playing,
    // a new pass was scheduled on this tick
    Looped,
    // the last pass ran out and looping was off
    Finished,
}

#[derive(Clone, Debug)]
pub struct Playback {
    pub mode: PlaybackMode,
    pub looping: bool,
    pub voice_duration: f32,
    playing: bool,
    pass_start: f64,
    horizon: f64,
    passes: u32,
}

impl Playback {
    pub fn new(mode: PlaybackMode, looping: bool, voice_duration: f32) -> Self {
        Self {
            mode,
            looping,
            voice_duration,
            playing: false,
            pass_start: 0.0,
            horizon: 0.0,
            passes: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Position within the current pass, 0..1.
    pub fn progress(&self, now: f64) -> f32 {
        let len = self.horizon - self.pass_start;
        if !self.playing || len <= 0.0 {
            return 0.0;
        }
        ((now - self.pass_start) / len).clamp(0.0, 1.0) as f32
    }

    /// Starts playback at `now`. Returns false when there is nothing to play.
    pub fn play(&mut self, project: &Project, now: f64, out: &mut impl ToneGenerator) -> bool {
        self.passes = 0;
        self.playing = self.schedule(project, now, out);
        if self.playing {
            info!("playback started ({}, loop {})", self.mode.label(), self.looping);
        }
        self.playing
    }

    // Voices already handed over keep sounding; only later passes are prevented.
    pub fn stop(&mut self) {
        if self.playing {
            info!("playback stopped after {} passes", self.passes);
        }
        self.playing = false;
    }

    /// Call once per host-loop tick. Edits made since the last pass are picked up here.
    pub fn tick(&mut self, project: &Project, now: f64, out: &mut impl ToneGenerator) -> PlaybackStatus {
        if !self.playing {
            return PlaybackStatus::Idle;
        }
        if now < self.horizon {
            return PlaybackStatus::Playing;
        }
        if !self.looping {
            self.playing = false;
            debug!("playback finished");
            return PlaybackStatus::Finished;
        }
        // next pass starts where the previous one ended, not at the late tick,
        // unless the host stalled for more than a beat: then missed passes are dropped
        let late = now - self.horizon;
        let start = if late > beat_interval_secs(project.tempo_bpm) {
            debug!("playback {late:.2}s late, restarting pass at {now:.2}");
            now
        } else {
            self.horizon
        };
        if self.schedule(project, start, out) {
            PlaybackStatus::Looped
        } else {
            self.playing = false;
            PlaybackStatus::Finished
        }
    }

    fn schedule(&mut self, project: &Project, start: f64, out: &mut impl ToneGenerator) -> bool {
        let len = loop_duration_secs(project);
        if len <= 0.0 {
            return false;
        }
        let sent = schedule_pass(project, self.mode, start, self.voice_duration, out);
        self.pass_start = start;
        self.horizon = start + len;
        self.passes += 1;
        debug!("pass {} scheduled: {sent} voices, {len:.2}s", self.passes);
        true
    }
}
