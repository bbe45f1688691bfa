use crate::shared::NUM_HIT_DOTS;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

const COLS: usize = 4;
const ROWS: usize = 4;

// one cell per hit, in recording order; brighter cells were louder hits
pub fn draw_hit_grid(frame: &mut Frame, area: Rect, dots: &[Option<f32>; NUM_HIT_DOTS]) {
    let row_constraints = [Constraint::Percentage(25); ROWS];
    let col_constraints = [Constraint::Percentage(25); COLS];

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints)
            .split(*row_area);

        for (col_idx, cell_area) in cols.iter().enumerate() {
            let style = match dots[row_idx * COLS + col_idx] {
                Some(brightness) => {
                    let c = dot_color(brightness);
                    Style::default().fg(c).bg(c)
                }
                None => Style::default().fg(Color::DarkGray),
            };
            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(style)
                .style(style);
            frame.render_widget(block, *cell_area);
        }
    }
}

fn dot_color(brightness: f32) -> Color {
    // keep quiet hits visible against the background
    let b = 0.25 + 0.75 * brightness.clamp(0.0, 1.0);
    Color::Rgb((255.0 * b) as u8, (64.0 * b) as u8, (255.0 * b) as u8)
}
