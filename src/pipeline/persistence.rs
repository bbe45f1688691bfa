// Saves and loads the project as JSON. The field names are the exchange
// format other tools read, so the snapshot structs below mirror it exactly.
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::QuantizedEvent;
use crate::audio_api::Instrument;
use crate::error::ProjectFileError;
use crate::pipeline::project::{Project, Track, TrackId};

pub const RHYTHMTTY_DIR: &str = ".rhythmtty";
const PROJECT_FILE: &str = "project.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub name: String,
    pub tempo: u32,
    pub volume: f32,
    pub tracks: Vec<TrackSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub name: String,
    pub instrument: Instrument,
    pub beats: Vec<BeatSnapshot>,
    pub tempo: u32,
    pub duration: f64,
    pub pitch: i32,
    pub speed: u32,
    pub volume: u32,
    pub pan: i32,
    pub reversed: bool,
    pub muted: bool,
    pub soloed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatSnapshot {
    pub time: f64,
    pub frequency: f32,
    pub energy: f32,
    pub velocity: f32,
}

impl From<&Project> for ProjectSnapshot {
    fn from(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            tempo: project.tempo_bpm,
            volume: project.master_volume,
            tracks: project.tracks().iter().map(TrackSnapshot::from).collect(),
        }
    }
}

impl From<&Track> for TrackSnapshot {
    fn from(t: &Track) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            instrument: t.instrument,
            beats: t
                .events
                .iter()
                .map(|e| BeatSnapshot {
                    time: e.time,
                    frequency: e.frequency_hz,
                    energy: e.energy,
                    velocity: e.velocity,
                })
                .collect(),
            tempo: t.base_tempo_bpm,
            duration: t.duration_secs,
            pitch: t.pitch_semitones,
            speed: t.speed_percent,
            volume: t.volume_percent,
            pan: t.pan_percent,
            reversed: t.reversed,
            muted: t.muted,
            soloed: t.soloed,
        }
    }
}

impl From<TrackSnapshot> for Track {
    fn from(s: TrackSnapshot) -> Self {
        Track {
            id: s.id,
            name: s.name,
            instrument: s.instrument,
            events: s
                .beats
                .into_iter()
                .map(|b| QuantizedEvent {
                    time: b.time,
                    frequency_hz: b.frequency,
                    energy: b.energy,
                    velocity: b.velocity,
                    grid_index: None,
                })
                .collect(),
            base_tempo_bpm: s.tempo,
            duration_secs: s.duration,
            pitch_semitones: s.pitch,
            speed_percent: s.speed,
            volume_percent: s.volume,
            pan_percent: s.pan,
            reversed: s.reversed,
            muted: s.muted,
            soloed: s.soloed,
        }
    }
}

impl TryFrom<ProjectSnapshot> for Project {
    type Error = ProjectFileError;

    fn try_from(s: ProjectSnapshot) -> Result<Self, Self::Error> {
        let tracks = s.tracks.into_iter().map(Track::from).collect();
        Project::from_parts(s.name, s.tempo, s.volume, tracks)
    }
}

// <project_dir>/.rhythmtty/project.json
fn project_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(RHYTHMTTY_DIR).join(PROJECT_FILE)
}

pub fn to_json(project: &Project) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&ProjectSnapshot::from(project))?)
}

pub fn from_json(json: &str) -> anyhow::Result<Project> {
    let snapshot: ProjectSnapshot = serde_json::from_str(json).context("malformed project file")?;
    Ok(Project::try_from(snapshot)?)
}

/// Ok(None) when the directory has no saved project yet.
pub fn load_project(project_dir: &Path) -> anyhow::Result<Option<Project>> {
    let path = project_file_path(project_dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let project = from_json(&data)?;
    info!("loaded '{}' ({} tracks) from {}", project.name, project.tracks().len(), path.display());
    Ok(Some(project))
}

// Save the project, making .rhythmtty/ if it doesn't exist already
pub fn save_project(project_dir: &Path, project: &Project) -> anyhow::Result<PathBuf> {
    let path = project_file_path(project_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, to_json(project)?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!("saved '{}' to {}", project.name, path.display());
    Ok(path)
}
