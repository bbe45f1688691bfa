use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::analysis::{Cadence, LOOSE_ONSET_THRESHOLD};
use crate::pipeline::persistence::RHYTHMTTY_DIR;
use crate::pipeline::playback::{PlaybackMode, DEFAULT_VOICE_DURATION_SECS};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub onset_threshold: f32,
    pub cadence: Cadence,
    pub playback_mode: PlaybackMode,
    pub voice_duration_secs: f32,
    pub loop_playback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            onset_threshold: LOOSE_ONSET_THRESHOLD,
            cadence: Cadence::default(),
            playback_mode: PlaybackMode::Ensemble,
            voice_duration_secs: DEFAULT_VOICE_DURATION_SECS,
            loop_playback: false,
        }
    }
}

pub fn settings_path(project_dir: &Path) -> PathBuf {
    project_dir.join(RHYTHMTTY_DIR).join(SETTINGS_FILE)
}

/// Missing keys take their defaults; an unreadable file falls back to defaults entirely.
pub fn load_settings(project_dir: &Path) -> Settings {
    let path = settings_path(project_dir);
    let Ok(data) = fs::read_to_string(&path) else {
        return Settings::default();
    };
    match serde_json::from_str(&data) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("ignoring {}: {e}", path.display());
            Settings::default()
        }
    }
}
