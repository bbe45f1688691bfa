use crate::shared::ParamPage;

// state local to tui, used to resolve knob keys into semantic inputevents
// recording, playing, and param_page are synced from DisplayState per loop
#[derive(Clone, Debug)]
pub struct TuiState {
    pub recording: bool,
    pub playing: bool,
    pub param_page: ParamPage,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            recording: false,
            playing: false,
            param_page: ParamPage::Tone,
        }
    }
}
