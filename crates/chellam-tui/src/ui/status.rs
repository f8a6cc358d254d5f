//! Status bar — online state, typing indicator, notices.

use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::App;

pub fn draw(frame: &mut Frame, app: &App, area: Rect) {
    let transcript = &app.transcript;
    let (state_str, state_color) = if transcript.is_closed() {
        ("offline", Color::DarkGray)
    } else if transcript.is_typing() || transcript.is_revealing() {
        ("replying", Color::Green)
    } else {
        ("online", Color::Cyan)
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", state_str),
            Style::default().fg(Color::Black).bg(state_color),
        ),
        Span::raw(" "),
    ];

    if !transcript.indicator().is_empty() {
        spans.push(Span::styled(
            transcript.indicator().to_string(),
            Style::default().fg(Color::Gray).italic(),
        ));
    }

    if let Some(ref notice) = app.notice {
        spans.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Yellow),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
