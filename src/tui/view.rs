use crate::shared::{DisplayState, ParamPage};
use super::grid::draw_hit_grid;
use ratatui::layout::{Layout, Direction, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

const HELP: &str = "b rec  1-6 inst  spc play  l loop  t mode  ,/. bpm  9/0 vol  j/k sel  s solo  m mute  r rev  x del  p page  [ ] - = knobs  w save  n new  esc quit";

pub fn render(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
   let sections = Layout::default()
       .direction(Direction::Vertical)
       .constraints([
           Constraint::Length(3), // transport line
           Constraint::Length(5), // lcd screen
           Constraint::Length(3), // knobs + pass progress
           Constraint::Min(8), // track list + hit grid
           Constraint::Length(1), // key help
       ])
       .split(area);

   draw_transport(frame, sections[0], state, blink_on);
   draw_screen(frame, sections[1], state);
   draw_knob_row(frame, sections[2], state);
   draw_body(frame, sections[3], state);
   frame.render_widget(
       Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
       sections[4],
   );
}

fn draw_transport(frame: &mut Frame, area: Rect, state: &DisplayState, blink_on: bool) {
   let rec = if state.recording && blink_on {
       Span::styled(" ● REC ", Style::default().fg(Color::White).bg(Color::Red))
   } else if state.recording {
       Span::styled(" ● REC ", Style::default().fg(Color::Red))
   } else {
       Span::styled(" ○ rec ", Style::default().fg(Color::DarkGray))
   };
   let play = if state.playing {
       Span::styled(" ▶ PLAY ", Style::default().fg(Color::Black).bg(Color::Green))
   } else {
       Span::styled(" ■ stop ", Style::default().fg(Color::DarkGray))
   };
   let looping = if state.looping {
       Span::styled(" ⟳ loop ", Style::default().fg(Color::Cyan))
   } else {
       Span::styled(" ⟳ once ", Style::default().fg(Color::DarkGray))
   };

   let line = Line::from(vec![
       rec,
       play,
       looping,
       Span::raw(format!(" {} ", state.mode.label())),
       Span::styled(format!(" {} BPM ", state.tempo_bpm), Style::default().add_modifier(Modifier::BOLD)),
       Span::raw(format!(" vol {}% ", state.master_volume_percent)),
       Span::styled(format!(" next: {} ", state.instrument.label()), Style::default().fg(Color::Yellow)),
   ]);
   let block = Block::default()
       .borders(Borders::ALL)
       .title(format!(" rhythmtty · {} ", state.project_name));
   frame.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_screen(frame: &mut Frame, area: Rect, state: &DisplayState) {
   let mut lines = Vec::new();

   if state.recording {
       let (hz, energy) = state
           .live_frame
           .map_or((0.0, 0.0), |f| (f.dominant_frequency_hz, f.energy_rms));
       lines.push(Line::from(format!(
           "{:>6.2}s   {:>5.0} Hz   {} hits",
           state.elapsed_secs, hz, state.take_hits
       )));
       lines.push(Line::from(vec![
           Span::raw("level "),
           Span::styled(meter(energy, 30), Style::default().fg(Color::LightMagenta)),
           Span::styled(format!(" thr {:.2}", state.onset_threshold), Style::default().fg(Color::DarkGray)),
       ]));
   } else if let Some(a) = &state.analysis {
       lines.push(Line::from(format!(
           "{} hits in {:.2}s   {} BPM ({})   {}",
           a.event_count,
           a.duration_secs,
           a.tempo_bpm,
           a.feel.label(),
           a.time_signature.label(),
       )));
       lines.push(Line::from(format!(
           "pattern {}   complexity {}   avg {:.0} Hz   energy {:.2}",
           a.pattern_type.label(),
           a.complexity.label(),
           a.average_frequency_hz,
           a.average_energy,
       )));
   }
   lines.push(Line::from(Span::styled(
       state.display_text.clone(),
       Style::default().fg(Color::Yellow),
   )));

   frame.render_widget(
       Paragraph::new(lines).block(Block::default().borders(Borders::ALL)),
       area,
   );
}

fn draw_knob_row(frame: &mut Frame, area: Rect, state: &DisplayState) {
   let cols = Layout::default()
       .direction(Direction::Horizontal)
       .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
       .split(area);

   let page = match state.param_page {
       ParamPage::Tone => "TONE",
       ParamPage::Motion => "MOTION",
   };
   let knobs = Line::from(vec![
       Span::styled(format!("{page:<7}"), Style::default().add_modifier(Modifier::BOLD)),
       Span::raw(format!("{} {:+}   ", state.knob_a_label, state.knob_a_value)),
       Span::raw(format!("{} {:+}", state.knob_b_label, state.knob_b_value)),
   ]);
   frame.render_widget(
       Paragraph::new(knobs).block(Block::default().borders(Borders::ALL)),
       cols[0],
   );

   let gauge = Gauge::default()
       .block(Block::default().borders(Borders::ALL))
       .gauge_style(Style::default().fg(Color::Green))
       .ratio(state.progress.clamp(0.0, 1.0) as f64);
   frame.render_widget(gauge, cols[1]);
}

fn draw_body(frame: &mut Frame, area: Rect, state: &DisplayState) {
   let cols = Layout::default()
       .direction(Direction::Horizontal)
       .constraints([Constraint::Min(30), Constraint::Length(26)])
       .split(area);

   let items: Vec<ListItem> = state
       .tracks
       .iter()
       .enumerate()
       .map(|(i, t)| {
           let flags = format!(
               "{}{}{}",
               if t.soloed { "S" } else { "·" },
               if t.muted { "M" } else { "·" },
               if t.reversed { "R" } else { "·" },
           );
           let text = format!(
               "{:<10} {:<6} {:>3} hits {:>3} bpm {:>5.2}s {}",
               t.name,
               t.instrument.label(),
               t.hits,
               t.tempo_bpm,
               t.duration_secs,
               flags,
           );
           let style = if state.selected == Some(i) {
               Style::default().fg(Color::Black).bg(Color::LightMagenta)
           } else if t.muted {
               Style::default().fg(Color::DarkGray)
           } else {
               Style::default()
           };
           ListItem::new(text).style(style)
       })
       .collect();

   let list = List::new(items).block(Block::default().borders(Borders::ALL).title(" tracks "));
   frame.render_widget(list, cols[0]);
   draw_hit_grid(frame, cols[1], &state.hit_dots);
}

fn meter(level: f32, width: usize) -> String {
   let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
   format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}
