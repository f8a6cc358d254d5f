//! App state and input handling.

use chellam_core::events::ChatEvent;
use chellam_core::transcript::Transcript;

/// The main application state.
pub struct App {
    pub bot_name: String,
    pub transcript: Transcript,
    pub input: String,
    /// Lines scrolled up from the bottom of the chat
    pub scroll_offset: usize,
    /// One-line notice under the chat (rejections, shutdown)
    pub notice: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(bot_name: &str) -> Self {
        App {
            bot_name: bot_name.to_string(),
            transcript: Transcript::new(),
            input: String::new(),
            scroll_offset: 0,
            notice: None,
            should_quit: false,
        }
    }

    /// Handle an event from the session loop.
    pub fn handle_event(&mut self, event: ChatEvent) {
        match &event {
            ChatEvent::UserMessage { .. } | ChatEvent::BotMessageStarted { .. } => {
                // Auto-scroll to bottom
                self.scroll_offset = 0;
                self.notice = None;
            }
            ChatEvent::SubmissionRejected { text } => {
                let preview: String = text.chars().take(40).collect();
                self.notice = Some(format!(
                    "Still replying; \"{}\" was not sent",
                    preview
                ));
            }
            ChatEvent::ShutdownScheduled { delay_ms } => {
                self.notice = Some(format!("Closing in {:.1}s...", *delay_ms as f64 / 1000.0));
            }
            ChatEvent::Closed => {
                self.should_quit = true;
            }
            _ => {}
        }
        self.transcript.apply(&event);
    }

    /// Take the input line for sending, if there is anything to send.
    pub fn take_input(&mut self) -> Option<String> {
        if self.input.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.input))
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}
