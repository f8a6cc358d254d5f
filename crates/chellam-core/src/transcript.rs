//! Append-only transcript rebuilt from the ChatEvent stream.

use tracing::warn;

use crate::events::ChatEvent;
use crate::types::{Message, Sender};

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Index of the bot message still receiving chars. User echoes may
    /// land after it while it reveals.
    open: Option<usize>,
    indicator: String,
    typing: bool,
    closed: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// True while a bot message is still being revealed.
    pub fn is_revealing(&self) -> bool {
        self.open.is_some()
    }

    pub fn indicator(&self) -> &str {
        &self.indicator
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// `(sender, text)` pairs, handy for comparisons.
    pub fn lines(&self) -> Vec<(Sender, &str)> {
        self.messages
            .iter()
            .map(|m| (m.sender, m.text.as_str()))
            .collect()
    }

    pub fn apply(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::UserMessage { text, sent_at } => {
                self.messages.push(Message {
                    sender: Sender::User,
                    text: text.clone(),
                    sent_at: *sent_at,
                });
            }
            ChatEvent::BotMessageStarted { sent_at } => {
                self.messages.push(Message {
                    sender: Sender::Bot,
                    text: String::new(),
                    sent_at: *sent_at,
                });
                self.open = Some(self.messages.len() - 1);
            }
            ChatEvent::CharRevealed(ch) => match self.open.and_then(|i| self.messages.get_mut(i)) {
                Some(message) => message.text.push(*ch),
                _ => warn!("Dropping revealed char {:?}: no open bot message", ch),
            },
            ChatEvent::MessageFinalized => {
                self.open = None;
            }
            ChatEvent::TypingStarted => self.typing = true,
            ChatEvent::TypingStopped => self.typing = false,
            ChatEvent::Indicator(text) => self.indicator = text.clone(),
            ChatEvent::Closed => {
                self.closed = true;
                self.open = None;
            }
            ChatEvent::SubmissionRejected { .. } | ChatEvent::ShutdownScheduled { .. } => {}
        }
    }
}
