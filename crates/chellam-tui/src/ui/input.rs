//! Text input bar.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let border_color = if app.transcript.is_closed() {
        Color::DarkGray
    } else {
        Color::Cyan
    };

    let block = Block::default()
        .title(" Message (Enter to send, Ctrl+C to quit) ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let input = Paragraph::new(app.input.as_str()).style(Style::default().fg(Color::White));
    frame.render_widget(input, inner);

    frame.set_cursor_position(Position::new(cursor_x(inner, &app.input), inner.y));
}

/// Column after the last typed char, pinned inside the box.
fn cursor_x(inner: Rect, input: &str) -> u16 {
    let offset = input
        .chars()
        .count()
        .min(inner.width.saturating_sub(1) as usize) as u16;
    inner.x.saturating_add(offset)
}
