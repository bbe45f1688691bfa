mod analysis;
mod audio;
mod audio_api;
mod error;
mod middle;
mod pipeline;
mod settings;
mod shared;
mod tui;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use crossterm::terminal;
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use analysis::{Cadence, STRICT_ONSET_THRESHOLD};
use audio_api::{Clock, ToneGenerator};
use middle::Middle;
use pipeline::persistence::{self, RHYTHMTTY_DIR};
use pipeline::playback::PlaybackMode;
use settings::Settings;
use shared::InputEvent;

const LOG_FILE: &str = "rhythmtty.log";

#[derive(Parser)]
#[command(name = "rhythmtty")]
#[command(about = "Tap or sing a rhythm into the microphone and play it back as synth tracks")]
struct Cli {
    /// Project directory (defaults to the current directory)
    project_dir: Option<PathBuf>,

    /// Onset threshold on frame RMS energy, 0..1
    #[arg(long)]
    threshold: Option<f32>,

    /// Use the strict onset threshold preset
    #[arg(long, conflicts_with = "threshold")]
    strict: bool,

    /// Capture one frame every N milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Capture a frame on every UI tick instead of on a fixed interval
    #[arg(long, conflicts_with = "interval_ms")]
    every_tick: bool,

    /// Space each track by its own speed instead of its recorded tempo
    #[arg(long)]
    per_track: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(t) = self.threshold {
            settings.onset_threshold = t.clamp(0.0, 1.0);
        }
        if self.strict {
            settings.onset_threshold = STRICT_ONSET_THRESHOLD;
        }
        if let Some(ms) = self.interval_ms {
            settings.cadence = Cadence::Interval { ms: ms.max(1) };
        }
        if self.every_tick {
            settings.cadence = Cadence::EveryTick;
        }
        if self.per_track {
            settings.playback_mode = PlaybackMode::PerTrack;
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

// the terminal belongs to the ui, so log lines go to a file in the project dir
fn init_logging(project_dir: &Path) -> anyhow::Result<()> {
    let dir = project_dir.join(RHYTHMTTY_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let file = fs::File::create(dir.join(LOG_FILE)).context("failed to open log file")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let project_dir = match &cli.project_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("no current directory")?,
    };
    init_logging(&project_dir)?;

    let mut settings = settings::load_settings(&project_dir);
    cli.apply(&mut settings);
    info!("settings: {settings:?}");

    let project = match persistence::load_project(&project_dir) {
        Ok(Some(p)) => p,
        Ok(None) => Default::default(),
        Err(e) => {
            warn!("could not load project, starting fresh: {e:#}");
            Default::default()
        }
    };
    let mut middle = Middle::with_project(project, &settings);

    let mut audio = audio::start_audio()?;
    audio.set_master_volume(middle.project.master_volume);

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let blink_start = Instant::now();
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        let blink_on = (blink_start.elapsed().as_millis() / 250) % 2 == 0;
        let ds = middle.display_state(audio.current_time());

        tui_state.recording = ds.recording;
        tui_state.playing = ds.playing;
        tui_state.param_page = ds.param_page;

        term.draw(|frame| {
            let area = frame.area();
            tui::view::render(frame, area, &ds, blink_on);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            match event {
                InputEvent::Quit => {
                    // save before quitting
                    if let Err(e) = persistence::save_project(&project_dir, &middle.project) {
                        warn!("save on quit failed: {e:#}");
                    }
                    drop(term);
                    drop(audio);
                    return Ok(());
                }
                InputEvent::SaveProject => match persistence::save_project(&project_dir, &middle.project) {
                    Ok(path) => middle.set_status(format!("saved {}", path.display())),
                    Err(e) => {
                        warn!("save failed: {e:#}");
                        middle.set_status(format!("save failed: {e}"));
                    }
                },
                other => middle.handle_input(other, &mut audio),
            }
        }

        middle.tick(&mut audio);
    }
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
