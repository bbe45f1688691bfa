use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::audio_api::Instrument;
use crate::shared::{InputEvent, ParamPage};
use super::mode::TuiState;

const PITCH_STEP: i32 = 1; // semitones
const SPEED_STEP: i32 = 5; // percent
const VOLUME_STEP: i32 = 5; // percent
const PAN_STEP: i32 = 10; // percent
const MASTER_VOLUME_STEP: i32 = 5; // percent

// poll for input from tui and resolve keys into input events for the backend
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],
        KeyCode::Char('b') => vec![InputEvent::ToggleRecord],

        // instrument for the next take
        KeyCode::Char(c @ '1'..='6') => char_to_instrument(c)
            .map(|i| vec![InputEvent::SelectInstrument(i)])
            .unwrap_or_default(),
        KeyCode::Char('i') => vec![InputEvent::CycleTrackInstrument],

        KeyCode::Char('l') => vec![InputEvent::ToggleLoop],
        KeyCode::Char('t') => vec![InputEvent::ToggleMode],
        KeyCode::Char(',') => vec![InputEvent::AdjustTempo(-1)],
        KeyCode::Char('.') => vec![InputEvent::AdjustTempo(1)],
        KeyCode::Char('9') => vec![InputEvent::AdjustMasterVolume(-MASTER_VOLUME_STEP)],
        KeyCode::Char('0') => vec![InputEvent::AdjustMasterVolume(MASTER_VOLUME_STEP)],

        KeyCode::Up | KeyCode::Char('k') => vec![InputEvent::SelectPrev],
        KeyCode::Down | KeyCode::Char('j') => vec![InputEvent::SelectNext],
        KeyCode::Char('s') => vec![InputEvent::ToggleSolo],
        KeyCode::Char('m') => vec![InputEvent::ToggleMute],
        KeyCode::Char('r') => vec![InputEvent::ToggleReverse],
        KeyCode::Char('x') => vec![InputEvent::DeleteTrack],
        KeyCode::Char('p') => {
            // flip locally too so a second knob turn in the same poll sees the new page
            ts.param_page = ts.param_page.next();
            vec![InputEvent::NextParamPage]
        }

        // knobs for more continuous control
        KeyCode::Char('[') => resolve_knob_a(-1, ts),
        KeyCode::Char(']') => resolve_knob_a(1, ts),
        KeyCode::Char('-') => resolve_knob_b(-1, ts),
        KeyCode::Char('=') => resolve_knob_b(1, ts),

        KeyCode::Char('n') => vec![InputEvent::NewProject],
        KeyCode::Char('w') => vec![InputEvent::SaveProject],

        _ => vec![],
    }
}

// resolve knob a turn into a semantic event based on the param page
fn resolve_knob_a(dir: i32, ts: &TuiState) -> Vec<InputEvent> {
    match ts.param_page {
        ParamPage::Tone => vec![InputEvent::AdjustPitch(dir * PITCH_STEP)],
        ParamPage::Motion => vec![InputEvent::AdjustSpeed(dir * SPEED_STEP)],
    }
}

// resolve knob b turn into a semantic event based on the param page
fn resolve_knob_b(dir: i32, ts: &TuiState) -> Vec<InputEvent> {
    match ts.param_page {
        ParamPage::Tone => vec![InputEvent::AdjustVolume(dir * VOLUME_STEP)],
        ParamPage::Motion => vec![InputEvent::AdjustPan(dir * PAN_STEP)],
    }
}

fn char_to_instrument(c: char) -> Option<Instrument> {
    let idx = c.to_digit(10)? as usize;
    Instrument::ALL.get(idx.checked_sub(1)?).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knobs_follow_param_page() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char(']'), &mut ts), vec![InputEvent::AdjustPitch(1)]);
        assert_eq!(handle_key(KeyCode::Char('-'), &mut ts), vec![InputEvent::AdjustVolume(-5)]);

        handle_key(KeyCode::Char('p'), &mut ts);
        assert_eq!(handle_key(KeyCode::Char('['), &mut ts), vec![InputEvent::AdjustSpeed(-5)]);
        assert_eq!(handle_key(KeyCode::Char('='), &mut ts), vec![InputEvent::AdjustPan(10)]);
    }

    #[test]
    fn test_number_keys_pick_instruments() {
        let mut ts = TuiState::default();
        assert_eq!(handle_key(KeyCode::Char('1'), &mut ts), vec![InputEvent::SelectInstrument(Instrument::Synth)]);
        assert_eq!(handle_key(KeyCode::Char('5'), &mut ts), vec![InputEvent::SelectInstrument(Instrument::Drums)]);
    }
}
