use log::{debug, info, warn};

use crate::analysis::{PatternAnalysis, Recorder};
use crate::audio_api::{AudioSource, Instrument, ToneGenerator};
use crate::error::RhythmError;
use crate::pipeline::playback::{Playback, PlaybackStatus};
use crate::pipeline::project::{Project, Track, TrackEdit, TrackId};
use crate::settings::Settings;
use crate::shared::{hit_brightness, DisplayState, InputEvent, ParamPage, TrackRow, NUM_HIT_DOTS};

/// The controller: owns the project, the recorder and the playback session,
/// and turns semantic input events into calls on them. The audio device is
/// passed in per call so tests can drive everything with a fake clock.
pub struct Middle {
    pub project: Project,
    recorder: Recorder,
    playback: Playback,
    instrument: Instrument,
    selected: Option<TrackId>,
    param_page: ParamPage,
    last_analysis: Option<PatternAnalysis>,
    status: String,
}

impl Middle {
    pub fn new(settings: &Settings) -> Self {
        Self::with_project(Project::default(), settings)
    }

    pub fn with_project(project: Project, settings: &Settings) -> Self {
        let selected = project.tracks().first().map(|t| t.id);
        Self {
            project,
            recorder: Recorder::new(settings.onset_threshold, settings.cadence),
            playback: Playback::new(settings.playback_mode, settings.loop_playback, settings.voice_duration_secs),
            instrument: Instrument::default(),
            selected,
            param_page: ParamPage::Tone,
            last_analysis: None,
            status: "ready".into(),
        }
    }

    pub fn selected(&self) -> Option<TrackId> {
        self.selected
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, text: impl Into<String>) {
        self.status = text.into();
    }

    pub fn handle_input<A: AudioSource + ToneGenerator>(&mut self, event: InputEvent, audio: &mut A) {
        match event {
            InputEvent::ToggleRecord => {
                if self.recorder.is_recording() {
                    self.finish_recording(audio);
                } else {
                    self.start_recording(audio);
                }
            }
            InputEvent::SelectInstrument(instrument) => {
                self.instrument = instrument;
                self.status = format!("next take: {}", instrument.label());
            }
            InputEvent::CycleTrackInstrument => {
                if let Some(track) = self.selected_track() {
                    let instrument = track.instrument.next();
                    self.edit_selected(TrackEdit { instrument: Some(instrument), ..Default::default() });
                }
            }

            InputEvent::PlayPress => {
                if self.playback.is_playing() {
                    self.playback.stop();
                    self.status = "stopped".into();
                } else if self.playback.play(&self.project, audio.current_time(), audio) {
                    self.status = "playing".into();
                } else {
                    self.status = "nothing to play".into();
                }
            }
            InputEvent::ToggleLoop => {
                self.playback.looping = !self.playback.looping;
                self.status = format!("loop {}", if self.playback.looping { "on" } else { "off" });
            }
            InputEvent::ToggleMode => {
                self.playback.mode = self.playback.mode.toggle();
                self.status = format!("{} mode", self.playback.mode.label());
            }
            InputEvent::AdjustTempo(delta) => {
                let bpm = (self.project.tempo_bpm as i64 + delta as i64).max(0) as u32;
                self.project.set_tempo(bpm);
            }
            InputEvent::AdjustMasterVolume(delta) => {
                let percent = (self.project.master_volume * 100.0).round() as i32 + delta;
                self.project.set_master_volume(percent as f32 / 100.0);
                audio.set_master_volume(self.project.master_volume);
            }

            InputEvent::SelectPrev => self.move_selection(-1),
            InputEvent::SelectNext => self.move_selection(1),
            InputEvent::ToggleSolo => {
                if let Some(track) = self.selected_track() {
                    let (id, soloed) = (track.id, track.soloed);
                    self.apply(|p| p.set_solo(id, !soloed));
                }
            }
            InputEvent::ToggleMute => {
                if let Some(track) = self.selected_track() {
                    let (id, muted) = (track.id, track.muted);
                    self.apply(|p| p.set_muted(id, !muted));
                }
            }
            InputEvent::ToggleReverse => {
                if let Some(track) = self.selected_track() {
                    let reversed = !track.reversed;
                    self.edit_selected(TrackEdit { reversed: Some(reversed), ..Default::default() });
                }
            }
            InputEvent::DeleteTrack => self.delete_selected(),
            InputEvent::NextParamPage => self.param_page = self.param_page.next(),

            InputEvent::AdjustPitch(delta) => {
                if let Some(track) = self.selected_track() {
                    let pitch = track.pitch_semitones + delta;
                    self.edit_selected(TrackEdit { pitch_semitones: Some(pitch), ..Default::default() });
                }
            }
            InputEvent::AdjustSpeed(delta) => {
                if let Some(track) = self.selected_track() {
                    let speed = (track.speed_percent as i32 + delta).max(0) as u32;
                    self.edit_selected(TrackEdit { speed_percent: Some(speed), ..Default::default() });
                }
            }
            InputEvent::AdjustVolume(delta) => {
                if let Some(track) = self.selected_track() {
                    let volume = (track.volume_percent as i32 + delta).max(0) as u32;
                    self.edit_selected(TrackEdit { volume_percent: Some(volume), ..Default::default() });
                }
            }
            InputEvent::AdjustPan(delta) => {
                if let Some(track) = self.selected_track() {
                    let pan = track.pan_percent + delta;
                    self.edit_selected(TrackEdit { pan_percent: Some(pan), ..Default::default() });
                }
            }

            InputEvent::NewProject => self.new_project(audio),
            // handled by the host loop, which owns the project directory
            InputEvent::SaveProject | InputEvent::Quit => {}
        }
    }

    /// Runs once per host-loop tick: pulls a frame while recording and keeps
    /// the playback loop going.
    pub fn tick<A: AudioSource + ToneGenerator>(&mut self, audio: &mut A) {
        if let Some(hit) = self.recorder.tick(audio) {
            debug!("hit at {:.2}s: {} Hz, energy {:.3}", hit.time, hit.frequency_hz, hit.energy);
        }
        let now = audio.current_time();
        if self.playback.tick(&self.project, now, audio) == PlaybackStatus::Finished {
            self.status = "playback finished".into();
        }
    }

    fn start_recording<A: AudioSource>(&mut self, audio: &mut A) {
        match self.recorder.start(audio) {
            Ok(()) => self.status = format!("recording ({})", self.instrument.label()),
            Err(e) => {
                warn!("could not start recording: {e}");
                self.status = e.to_string();
            }
        }
    }

    // stop capture and keep the take as a new track
    fn finish_recording<A: AudioSource>(&mut self, audio: &mut A) {
        self.recorder.stop(audio);
        let take = self.recorder.take_events();
        match self.project.add_take(self.instrument, &take) {
            Ok((id, analysis)) => {
                self.selected = Some(id);
                self.last_analysis = Some(analysis);
                self.status = format!(
                    "{} hits, {} bpm, {} / {}",
                    analysis.event_count,
                    analysis.tempo_bpm,
                    analysis.pattern_type.label(),
                    analysis.complexity.label(),
                );
            }
            Err(e) => {
                info!("take discarded: {e}");
                self.status = e.to_string();
            }
        }
    }

    fn new_project<A: AudioSource>(&mut self, audio: &mut A) {
        self.recorder.stop(audio);
        self.recorder.take_events();
        self.playback.stop();
        self.project = Project::default();
        self.selected = None;
        self.last_analysis = None;
        self.status = "new project".into();
        info!("new project");
    }

    fn selected_track(&self) -> Option<&Track> {
        self.selected.and_then(|id| self.project.track(id))
    }

    fn selected_index(&self) -> Option<usize> {
        let id = self.selected?;
        self.project.tracks().iter().position(|t| t.id == id)
    }

    fn move_selection(&mut self, step: isize) {
        let tracks = self.project.tracks();
        if tracks.is_empty() {
            self.selected = None;
            return;
        }
        let last = tracks.len() as isize - 1;
        let idx = match self.selected_index() {
            Some(i) => (i as isize + step).clamp(0, last),
            None => 0,
        };
        self.selected = Some(tracks[idx as usize].id);
        self.last_analysis = self.selected_track().map(Track::analysis);
    }

    fn delete_selected(&mut self) {
        let Some(idx) = self.selected_index() else {
            return;
        };
        let Some(id) = self.selected else {
            return;
        };
        match self.project.delete_track(id) {
            Ok(track) => {
                self.status = format!("deleted {}", track.name);
                // select the neighbour that slid into place, else the new last track
                let tracks = self.project.tracks();
                self.selected = tracks.get(idx).or_else(|| tracks.last()).map(|t| t.id);
                self.last_analysis = None;
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    fn edit_selected(&mut self, edit: TrackEdit) {
        if let Some(id) = self.selected {
            self.apply(|p| p.edit_track(id, edit));
        }
    }

    fn apply(&mut self, op: impl FnOnce(&mut Project) -> Result<(), RhythmError>) {
        if let Err(e) = op(&mut self.project) {
            warn!("{e}");
            self.status = e.to_string();
        }
    }

    pub fn display_state(&self, now: f64) -> DisplayState {
        let tracks: Vec<TrackRow> = self
            .project
            .tracks()
            .iter()
            .map(|t| TrackRow {
                id: t.id,
                name: t.name.clone(),
                instrument: t.instrument,
                hits: t.events.len(),
                tempo_bpm: t.base_tempo_bpm,
                duration_secs: t.duration_secs,
                muted: t.muted,
                soloed: t.soloed,
                reversed: t.reversed,
            })
            .collect();

        // live take while recording, otherwise the selected track
        let mut hit_dots = [None; NUM_HIT_DOTS];
        let energies: Vec<f32> = if self.recorder.is_recording() {
            self.recorder.events().iter().map(|e| e.energy).collect()
        } else {
            self.selected_track()
                .map(|t| t.events.iter().map(|e| e.energy).collect())
                .unwrap_or_default()
        };
        for (dot, energy) in hit_dots.iter_mut().zip(energies) {
            *dot = Some(hit_brightness(energy));
        }

        let (knob_a_label, knob_b_label) = self.param_page.knob_labels();
        let (knob_a_value, knob_b_value) = match (self.selected_track(), self.param_page) {
            (Some(t), ParamPage::Tone) => (t.pitch_semitones, t.volume_percent as i32),
            (Some(t), ParamPage::Motion) => (t.speed_percent as i32, t.pan_percent),
            (None, _) => (0, 0),
        };

        DisplayState {
            project_name: self.project.name.clone(),
            recording: self.recorder.is_recording(),
            playing: self.playback.is_playing(),
            looping: self.playback.looping,
            mode: self.playback.mode,
            tempo_bpm: self.project.tempo_bpm,
            master_volume_percent: (self.project.master_volume * 100.0).round() as u32,
            instrument: self.instrument,
            live_frame: self.recorder.last_frame(),
            elapsed_secs: self.recorder.elapsed(),
            take_hits: self.recorder.events().len(),
            onset_threshold: self.recorder.threshold(),
            analysis: self.last_analysis,
            selected: self.selected_index(),
            tracks,
            param_page: self.param_page,
            knob_a_label,
            knob_b_label,
            knob_a_value,
            knob_b_value,
            hit_dots,
            progress: self.playback.progress(now),
            display_text: self.status.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pattern::{Complexity, PatternType};
    use crate::analysis::{Cadence, STRICT_ONSET_THRESHOLD};
    use crate::pipeline::test_fixture::FakeAudio;

    fn every_tick() -> Settings {
        Settings { cadence: Cadence::EveryTick, ..Settings::default() }
    }

    // records one hit per listed offset from the take start, silence in between
    fn record_take(middle: &mut Middle, audio: &mut FakeAudio, offsets: &[f64]) {
        let start = audio.now;
        middle.handle_input(InputEvent::ToggleRecord, audio);
        for &t in offsets {
            audio.now = start + t;
            audio.set_tone(0.5, 10);
            middle.tick(audio);
            audio.now = start + t + 0.2;
            audio.set_silence();
            middle.tick(audio);
        }
        middle.handle_input(InputEvent::ToggleRecord, audio);
    }

    #[test]
    fn test_steady_take_becomes_simple_track() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        record_take(&mut middle, &mut audio, &[0.0, 0.5, 1.0, 1.5]);

        assert!(!middle.is_recording());
        assert!(!audio.acquired);
        let id = middle.selected().unwrap();
        let track = middle.project.track(id).unwrap();
        assert_eq!(track.events.len(), 4);
        assert!((track.duration_secs - 1.5).abs() < 1e-9);
        assert_eq!(track.base_tempo_bpm, 120);

        let analysis = track.analysis();
        assert_eq!(analysis.pattern_type, PatternType::Simple);
        assert_eq!(analysis.complexity, Complexity::Low);
        assert_eq!(middle.display_state(audio.now).analysis, Some(analysis));
    }

    #[test]
    fn test_silent_take_creates_no_track() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        middle.handle_input(InputEvent::ToggleRecord, &mut audio);
        for i in 0..5 {
            audio.now = i as f64 * 0.1;
            middle.tick(&mut audio);
        }
        middle.handle_input(InputEvent::ToggleRecord, &mut audio);

        assert!(middle.project.tracks().is_empty());
        assert_eq!(middle.status(), "no sound detected");
    }

    #[test]
    fn test_missing_microphone_leaves_recorder_idle() {
        let mut audio = FakeAudio::new();
        audio.unavailable = true;
        let mut middle = Middle::new(&Settings::default());
        middle.handle_input(InputEvent::ToggleRecord, &mut audio);
        assert!(!middle.is_recording());
        assert!(middle.status().starts_with("microphone unavailable"));

        audio.unavailable = false;
        audio.denied = true;
        middle.handle_input(InputEvent::ToggleRecord, &mut audio);
        assert_eq!(middle.status(), "microphone permission denied");
    }

    #[test]
    fn test_solo_mutes_the_others() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        for _ in 0..3 {
            record_take(&mut middle, &mut audio, &[0.0, 0.5]);
        }
        middle.handle_input(InputEvent::SelectPrev, &mut audio);
        middle.handle_input(InputEvent::SelectPrev, &mut audio);
        middle.handle_input(InputEvent::ToggleSolo, &mut audio);
        let muted: Vec<bool> = middle.project.tracks().iter().map(|t| t.muted).collect();
        assert_eq!(muted, vec![false, true, true]);

        middle.handle_input(InputEvent::ToggleSolo, &mut audio);
        assert!(middle.project.tracks().iter().all(|t| !t.muted));
    }

    #[test]
    fn test_play_schedules_and_loops() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        record_take(&mut middle, &mut audio, &[0.0, 0.5, 1.0]);

        middle.handle_input(InputEvent::ToggleLoop, &mut audio);
        audio.now = 10.0;
        middle.handle_input(InputEvent::PlayPress, &mut audio);
        assert!(middle.is_playing());
        assert_eq!(audio.triggered.len(), 3);
        assert!((audio.triggered[0].start_time - 10.0).abs() < 1e-9);

        // 3 beats at 120 bpm
        audio.now = 11.5;
        middle.tick(&mut audio);
        assert_eq!(audio.triggered.len(), 6);

        middle.handle_input(InputEvent::PlayPress, &mut audio);
        audio.now = 13.0;
        middle.tick(&mut audio);
        assert_eq!(audio.triggered.len(), 6);
    }

    #[test]
    fn test_knob_edits_are_clamped() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        record_take(&mut middle, &mut audio, &[0.0, 0.5]);

        for _ in 0..30 {
            middle.handle_input(InputEvent::AdjustPitch(1), &mut audio);
            middle.handle_input(InputEvent::AdjustVolume(10), &mut audio);
        }
        let ds = middle.display_state(audio.now);
        assert_eq!((ds.knob_a_label, ds.knob_a_value), ("PITCH", 24));
        assert_eq!(ds.knob_b_value, 100);

        middle.handle_input(InputEvent::NextParamPage, &mut audio);
        middle.handle_input(InputEvent::AdjustPan(-500), &mut audio);
        let ds = middle.display_state(audio.now);
        assert_eq!((ds.knob_b_label, ds.knob_b_value), ("PAN", -100));
    }

    #[test]
    fn test_delete_moves_selection_to_neighbour() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        record_take(&mut middle, &mut audio, &[0.0]);
        record_take(&mut middle, &mut audio, &[0.0]);
        middle.handle_input(InputEvent::SelectPrev, &mut audio);
        let first = middle.selected().unwrap();

        middle.handle_input(InputEvent::DeleteTrack, &mut audio);
        assert!(middle.project.track(first).is_none());
        assert_eq!(middle.selected(), middle.project.tracks().first().map(|t| t.id));

        middle.handle_input(InputEvent::DeleteTrack, &mut audio);
        assert_eq!(middle.selected(), None);
    }

    #[test]
    fn test_hit_dots_follow_energy() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&every_tick());
        record_take(&mut middle, &mut audio, &[0.0, 0.5]);
        let ds = middle.display_state(audio.now);
        assert_eq!(ds.hit_dots[0], Some(1.0));
        assert_eq!(ds.hit_dots[1], Some(1.0));
        assert_eq!(ds.hit_dots[2], None);
    }

    #[test]
    fn test_master_volume_reaches_the_engine() {
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&Settings::default());
        middle.handle_input(InputEvent::AdjustMasterVolume(-30), &mut audio);
        assert!((audio.master_volume - 0.5).abs() < 1e-6);
        middle.handle_input(InputEvent::AdjustTempo(500), &mut audio);
        assert_eq!(middle.project.tempo_bpm, 240);
    }

    #[test]
    fn test_strict_threshold_is_shown_while_recording() {
        let settings = Settings { onset_threshold: STRICT_ONSET_THRESHOLD, ..every_tick() };
        let mut audio = FakeAudio::new();
        let mut middle = Middle::new(&settings);
        middle.handle_input(InputEvent::ToggleRecord, &mut audio);
        let ds = middle.display_state(audio.now);
        assert!(ds.recording);
        assert_eq!(ds.onset_threshold, STRICT_ONSET_THRESHOLD);
    }
}
