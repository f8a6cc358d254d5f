//! ChatEvent enum — emitted by the session loop to whatever draws the transcript.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Display-surface protocol. Applying these in order to a
/// [`Transcript`](crate::transcript::Transcript) rebuilds the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChatEvent {
    /// A complete user message
    #[serde(rename = "user_message")]
    UserMessage { text: String, sent_at: DateTime<Local> },

    /// An empty bot message that following chars are appended to
    #[serde(rename = "bot_message_started")]
    BotMessageStarted { sent_at: DateTime<Local> },

    /// One char of the open bot message
    #[serde(rename = "char")]
    CharRevealed(char),

    /// Paragraph terminator; the open bot message is closed
    #[serde(rename = "finalized")]
    MessageFinalized,

    #[serde(rename = "typing_started")]
    TypingStarted,

    #[serde(rename = "typing_stopped")]
    TypingStopped,

    /// New indicator label; empty string blanks it
    #[serde(rename = "indicator")]
    Indicator(String),

    /// Submission dropped because a turn is still in progress
    #[serde(rename = "rejected")]
    SubmissionRejected { text: String },

    #[serde(rename = "shutdown_scheduled")]
    ShutdownScheduled { delay_ms: u64 },

    /// The session loop has exited
    #[serde(rename = "closed")]
    Closed,
}

impl ChatEvent {
    /// `{"event": "...", "data": {...}}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Sending half of the display surface. Cheap to clone; each component gets
/// its own copy at construction.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ChatEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, event: ChatEvent) {
        // The frontend may already be gone during shutdown
        let _ = self.tx.send(event);
    }
}
