//! Core types — Sender, Message, TypingState, RevealCursor, UiTask, etc.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ── Messages ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// One entry in the transcript. Order in the transcript is the logical
/// timestamp; `sent_at` is only for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub sent_at: DateTime<Local>,
}

// ── Typing indicator ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypingState {
    pub active: bool,
    /// Number of dots shown, always in `0..=3`.
    pub phase: u8,
}

// ── Reveal ──

/// Cursor over the reply being revealed. Positions count chars, not bytes.
#[derive(Debug, Clone)]
pub struct RevealCursor {
    source: Vec<char>,
    position: usize,
}

impl RevealCursor {
    pub fn new(text: &str) -> Self {
        Self {
            source: text.chars().collect(),
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.position == self.source.len()
    }

    /// Take the char under the cursor and move past it.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.source.get(self.position).copied()?;
        self.position += 1;
        Some(ch)
    }
}

// ── UI task queue ──

/// Identifies one in-flight call to the reply engine.
pub type TurnId = u64;

/// Result of one worker run, handed back to the UI loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub turn: TurnId,
    pub text: String,
    /// True when the engine failed and `text` is the fallback reply.
    pub fallback: bool,
}

/// Work items drained by the session loop. Timers and the worker never touch
/// UI state directly; they post one of these instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiTask {
    Submit(String),
    IndicatorTick { generation: u64 },
    RevealStep { generation: u64 },
    ReplyReady(Completion),
    Shutdown,
}
