//! Scrollable chat feed — user messages and revealed bot replies.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use chellam_core::types::Sender;

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" {} ", app.bot_name))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let messages = app.transcript.messages();
    if messages.is_empty() {
        let empty = Paragraph::new("Say hello...").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for msg in messages {
        let (fg, who, alignment) = match msg.sender {
            Sender::User => (Color::Yellow, "You", Alignment::Right),
            Sender::Bot => (Color::Green, app.bot_name.as_str(), Alignment::Left),
        };
        lines.push(
            Line::styled(
                format!("{} · {}", who, msg.sent_at.format("%H:%M")),
                Style::default().fg(Color::DarkGray),
            )
            .alignment(alignment),
        );
        for line in msg.text.lines() {
            lines.push(Line::styled(line.to_string(), Style::default().fg(fg)).alignment(alignment));
        }
        // Paragraph break between messages
        lines.push(Line::raw(""));
    }

    // Bottom-anchored with scroll offset (wrapping ignored)
    let visible = inner.height as usize;
    let end = lines.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(visible);
    let window: Vec<Line> = lines.drain(start..end).collect();

    let paragraph = Paragraph::new(window).wrap(Wrap { trim: false });
    frame.render_widget(paragraph, inner);
}
