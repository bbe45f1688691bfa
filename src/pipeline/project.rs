// The project model the middle layer edits and the playback engine reads.
//
// "take": the hits captured between one record start and stop.
// "track": a quantized take plus the parameters it is rendered with.
// "project": the ordered list of tracks plus master tempo and volume.

use std::collections::HashSet;

use log::info;

use crate::analysis::pattern::{MAX_TEMPO_BPM, MIN_TEMPO_BPM};
use crate::analysis::{analyze, quantize, Event, PatternAnalysis, QuantizedEvent};
use crate::audio_api::Instrument;
use crate::error::{ProjectFileError, RhythmError};

pub type TrackId = u32;

pub const DEFAULT_TEMPO_BPM: u32 = 120;
pub const MIN_MASTER_TEMPO: u32 = 40;
pub const MAX_MASTER_TEMPO: u32 = 240;

pub const PITCH_RANGE: (i32, i32) = (-24, 24);
pub const SPEED_RANGE: (u32, u32) = (25, 400);
pub const VOLUME_RANGE: (u32, u32) = (0, 100);
pub const PAN_RANGE: (i32, i32) = (-100, 100);

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub instrument: Instrument,
    pub events: Vec<QuantizedEvent>,
    pub base_tempo_bpm: u32, // tempo detected when the take was recorded
    pub duration_secs: f64,
    pub pitch_semitones: i32,
    pub speed_percent: u32,
    pub volume_percent: u32,
    pub pan_percent: i32,
    pub reversed: bool,
    pub muted: bool,
    pub soloed: bool,
}

impl Track {
    pub fn new(id: TrackId, name: String, instrument: Instrument, events: Vec<QuantizedEvent>, analysis: &PatternAnalysis) -> Self {
        Self {
            id,
            name,
            instrument,
            events,
            base_tempo_bpm: analysis.tempo_bpm,
            duration_secs: analysis.duration_secs,
            pitch_semitones: 0,
            speed_percent: 100,
            volume_percent: 100,
            pan_percent: 0,
            reversed: false,
            muted: false,
            soloed: false,
        }
    }

    /// Frequency multiplier for the track's pitch shift.
    pub fn pitch_ratio(&self) -> f32 {
        2f32.powf(self.pitch_semitones as f32 / 12.0)
    }

    pub fn gain(&self) -> f32 {
        self.volume_percent as f32 / 100.0
    }

    pub fn pan(&self) -> f32 {
        self.pan_percent as f32 / 100.0
    }

    pub fn speed_ratio(&self) -> f64 {
        self.speed_percent as f64 / 100.0
    }

    pub fn analysis(&self) -> PatternAnalysis {
        analyze(&self.events)
    }

    // pull stored values back into the ranges edits are held to
    fn clamped(mut self) -> Self {
        self.base_tempo_bpm = self.base_tempo_bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM);
        self.pitch_semitones = self.pitch_semitones.clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        self.speed_percent = self.speed_percent.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        self.volume_percent = self.volume_percent.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1);
        self.pan_percent = self.pan_percent.clamp(PAN_RANGE.0, PAN_RANGE.1);
        self.duration_secs = self.duration_secs.max(0.0);
        for e in &mut self.events {
            e.energy = e.energy.clamp(0.0, 1.0);
            e.velocity = e.velocity.clamp(0.0, 1.0);
            e.frequency_hz = e.frequency_hz.max(0.0);
        }
        self
    }

    // events in the order playback walks them
    pub fn playback_order(&self) -> Box<dyn Iterator<Item = &QuantizedEvent> + '_> {
        if self.reversed {
            Box::new(self.events.iter().rev())
        } else {
            Box::new(self.events.iter())
        }
    }
}

/// A batch of parameter changes; `None` leaves the field alone. Values are clamped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackEdit {
    pub name: Option<String>,
    pub instrument: Option<Instrument>,
    pub pitch_semitones: Option<i32>,
    pub speed_percent: Option<u32>,
    pub volume_percent: Option<u32>,
    pub pan_percent: Option<i32>,
    pub reversed: Option<bool>,
}

impl TrackEdit {
    fn apply(self, track: &mut Track) {
        if let Some(name) = self.name {
            track.name = name;
        }
        if let Some(instrument) = self.instrument {
            track.instrument = instrument;
        }
        if let Some(p) = self.pitch_semitones {
            track.pitch_semitones = p.clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        }
        if let Some(s) = self.speed_percent {
            track.speed_percent = s.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        }
        if let Some(v) = self.volume_percent {
            track.volume_percent = v.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1);
        }
        if let Some(p) = self.pan_percent {
            track.pan_percent = p.clamp(PAN_RANGE.0, PAN_RANGE.1);
        }
        if let Some(r) = self.reversed {
            track.reversed = r;
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub name: String,
    pub tempo_bpm: u32,
    pub master_volume: f32, // 0..1
    tracks: Vec<Track>, // creation order
    next_id: TrackId,
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled")
    }
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tempo_bpm: DEFAULT_TEMPO_BPM,
            master_volume: 0.8,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuilds a project from stored tracks; new ids continue after the largest one.
    /// Stored parameters are clamped into their edit ranges. Duplicate ids and
    /// tracks without events are rejected.
    pub fn from_parts(name: String, tempo_bpm: u32, master_volume: f32, tracks: Vec<Track>) -> Result<Self, ProjectFileError> {
        let mut seen = HashSet::new();
        for t in &tracks {
            if !seen.insert(t.id) {
                return Err(ProjectFileError::DuplicateTrackId(t.id));
            }
            if t.events.is_empty() {
                return Err(ProjectFileError::EmptyTrack(t.id));
            }
        }

        let next_id = tracks.iter().map(|t| t.id).max().map_or(1, |m| m + 1);
        let master_volume = if master_volume.is_finite() { master_volume.clamp(0.0, 1.0) } else { 0.8 };
        let mut project = Self {
            name,
            tempo_bpm: tempo_bpm.clamp(MIN_MASTER_TEMPO, MAX_MASTER_TEMPO),
            master_volume,
            tracks: tracks.into_iter().map(Track::clamped).collect(),
            next_id,
        };
        // stored mute flags survive unless a solo overrides them
        if project.has_solo() {
            project.enforce_solo();
        }
        Ok(project)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, RhythmError> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(RhythmError::UnknownTrack(id))
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo_bpm = bpm.clamp(MIN_MASTER_TEMPO, MAX_MASTER_TEMPO);
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn add_track(&mut self, name: Option<String>, instrument: Instrument, events: Vec<QuantizedEvent>, analysis: &PatternAnalysis) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        let name = name.unwrap_or_else(|| format!("Track {id}"));
        info!("track {id} '{name}' added: {} hits, {} bpm, {}", events.len(), analysis.tempo_bpm, instrument.label());

        let mut track = Track::new(id, name, instrument, events, analysis);
        // a new track joins muted while another track is soloed
        track.muted = self.has_solo();
        self.tracks.push(track);
        id
    }

    /// Quantizes a finished take and stores it as a new track.
    pub fn add_take(&mut self, instrument: Instrument, take: &[Event]) -> Result<(TrackId, PatternAnalysis), RhythmError> {
        if take.is_empty() {
            return Err(RhythmError::EmptyRecording);
        }
        let events = quantize(take);
        let analysis = analyze(&events);
        let id = self.add_track(None, instrument, events, &analysis);
        Ok((id, analysis))
    }

    pub fn delete_track(&mut self, id: TrackId) -> Result<Track, RhythmError> {
        let idx = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(RhythmError::UnknownTrack(id))?;
        let removed = self.tracks.remove(idx);
        if removed.soloed {
            self.enforce_solo();
        }
        info!("track {id} deleted");
        Ok(removed)
    }

    pub fn edit_track(&mut self, id: TrackId, edit: TrackEdit) -> Result<(), RhythmError> {
        edit.apply(self.track_mut(id)?);
        Ok(())
    }

    pub fn set_muted(&mut self, id: TrackId, muted: bool) -> Result<(), RhythmError> {
        self.track_mut(id)?.muted = muted;
        Ok(())
    }

    pub fn set_solo(&mut self, id: TrackId, soloed: bool) -> Result<(), RhythmError> {
        self.track_mut(id)?.soloed = soloed;
        self.enforce_solo();
        Ok(())
    }

    pub fn has_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    // With any solo active, exactly the non-soloed tracks are muted.
    // With none, every track is unmuted.
    fn enforce_solo(&mut self) {
        let any_solo = self.has_solo();
        for t in &mut self.tracks {
            t.muted = any_solo && !t.soloed;
        }
    }

    /// Event count of the longest track, which sets the loop length.
    pub fn longest_track_len(&self) -> usize {
        self.tracks.iter().map(|t| t.events.len()).max().unwrap_or(0)
    }
}
