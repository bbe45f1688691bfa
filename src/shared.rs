// The current key plan:
//
// Recording:
//   b             //  ToggleRecord (start a take / stop it and keep it as a track)
//   1 .. 6        //  SelectInstrument(synth, piano, guitar, bass, drums, pad)
//   i             //  CycleTrackInstrument on the selected track
//
// Playback:
//   Space         //  PlayPress (play / stop)
//   l             //  ToggleLoop
//   t             //  ToggleMode (ensemble / per-track spacing)
//   , / .         //  AdjustTempo(-1 / +1)
//   9 / 0         //  AdjustMasterVolume(-5 / +5)
//
// Tracks:
//   j / k, Up/Down  //  SelectNext / SelectPrev
//   s             //  ToggleSolo
//   m             //  ToggleMute
//   r             //  ToggleReverse
//   x             //  DeleteTrack
//   p             //  NextParamPage
//
// Knobs (resolved against the param page by the tui):
//   [ / ]         //  knob a: AdjustPitch on Tone, AdjustSpeed on Motion
//   - / =         //  knob b: AdjustVolume on Tone, AdjustPan on Motion
//
// Project:
//   n             //  NewProject
//   w             //  SaveProject
//   Esc           //  Quit
//
// Only the middle layer holds project, recorder and playback state. Each frame
// the host loop asks it for a `DisplayState` and the tui draws that and nothing else.

use crate::analysis::{Frame, PatternAnalysis};
use crate::audio_api::Instrument;
use crate::pipeline::playback::PlaybackMode;
use crate::pipeline::project::TrackId;

// hit dots shown for the selected track (or the take in progress)
pub const NUM_HIT_DOTS: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    ToggleRecord,
    SelectInstrument(Instrument),
    CycleTrackInstrument,

    PlayPress,
    ToggleLoop,
    ToggleMode,
    AdjustTempo(i32),
    AdjustMasterVolume(i32), // percent

    SelectPrev,
    SelectNext,
    ToggleSolo,
    ToggleMute,
    ToggleReverse,
    DeleteTrack,
    NextParamPage,

    // semantic knob events, resolved by the tui from the param page
    AdjustPitch(i32), // semitones
    AdjustSpeed(i32), // percent
    AdjustVolume(i32), // percent
    AdjustPan(i32), // percent

    NewProject,
    SaveProject,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamPage {
    Tone,
    Motion,
}

impl ParamPage {
    pub fn next(self) -> Self {
        match self {
            ParamPage::Tone => ParamPage::Motion,
            ParamPage::Motion => ParamPage::Tone,
        }
    }

    pub fn knob_labels(self) -> (&'static str, &'static str) {
        match self {
            ParamPage::Tone => ("PITCH", "VOLUME"),
            ParamPage::Motion => ("SPEED", "PAN"),
        }
    }
}

/// One line of the track list.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackRow {
    pub id: TrackId,
    pub name: String,
    pub instrument: Instrument,
    pub hits: usize,
    pub tempo_bpm: u32,
    pub duration_secs: f64,
    pub muted: bool,
    pub soloed: bool,
    pub reversed: bool,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub project_name: String,
    pub recording: bool,
    pub playing: bool,
    pub looping: bool,
    pub mode: PlaybackMode,
    pub tempo_bpm: u32,
    pub master_volume_percent: u32,
    pub instrument: Instrument, // used for the next take
    pub live_frame: Option<Frame>, // last frame the recorder looked at
    pub elapsed_secs: f64,
    pub take_hits: usize,
    pub onset_threshold: f32, // energy a frame needs to count as a hit
    pub analysis: Option<PatternAnalysis>,
    pub tracks: Vec<TrackRow>,
    pub selected: Option<usize>, // index into `tracks`
    pub param_page: ParamPage,
    pub knob_a_label: &'static str,
    pub knob_b_label: &'static str,
    pub knob_a_value: i32,
    pub knob_b_value: i32,
    pub hit_dots: [Option<f32>; NUM_HIT_DOTS], // brightness 0..1, None = no hit
    pub progress: f32, // position in the current playback pass
    pub display_text: String, // status line
}

/// Dot brightness for a hit of the given energy; quiet hits still show.
pub fn hit_brightness(energy: f32) -> f32 {
    (energy * 2.0).clamp(0.0, 1.0)
}
