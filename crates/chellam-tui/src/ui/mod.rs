//! TUI layout compositing — assembles all UI panels.

mod chat;
mod input;
mod status;

use ratatui::prelude::*;

use crate::app::App;

/// Render the full TUI layout.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // ┌──────────────────────────────────┐
    // │ Chat feed                        │
    // │                                  │
    // ├──────────────────────────────────┤
    // │ Status / typing indicator        │
    // ├──────────────────────────────────┤
    // │ Input                            │
    // └──────────────────────────────────┘

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),    // chat
            Constraint::Length(1), // status
            Constraint::Length(3), // input
        ])
        .split(area);

    chat::draw(frame, app, main_layout[0]);
    status::draw(frame, app, main_layout[1]);
    input::draw(frame, app, main_layout[2]);
}
