//! Char-by-char reveal of a finished bot reply, with jittered pacing.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::config::Config;
use crate::events::{ChatEvent, EventSink};
use crate::timer::Timer;
use crate::types::{RevealCursor, UiTask};

/// Pacing between revealed chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub base_ms: u64,
    pub jitter_ms: u64,
    pub min_ms: u64,
}

impl RevealTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_ms: config.reveal_base_delay_ms,
            jitter_ms: config.reveal_jitter_ms,
            min_ms: config.reveal_min_delay_ms,
        }
    }

    /// `max(min, base + U[-jitter, jitter])`
    pub fn next_delay(&self, rng: &mut impl Rng) -> Duration {
        let jitter = self.jitter_ms as i64;
        let offset = if jitter == 0 {
            0
        } else {
            rng.gen_range(-jitter..=jitter)
        };
        let ms = (self.base_ms as i64 + offset).max(self.min_ms as i64);
        Duration::from_millis(ms as u64)
    }
}

/// Outcome of one reveal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Stale step from a cancelled reveal, or nothing is revealing
    Ignored,
    /// One char emitted, next step scheduled
    Revealed,
    /// Message finalized
    Finished,
}

pub struct RevealScheduler {
    cursor: Option<RevealCursor>,
    generation: u64,
    timing: RevealTiming,
    rng: StdRng,
    timer: Timer,
    sink: EventSink,
}

impl RevealScheduler {
    pub fn new(timing: RevealTiming, rng: StdRng, timer: Timer, sink: EventSink) -> Self {
        Self {
            cursor: None,
            generation: 0,
            timing,
            rng,
            timer,
            sink,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<&RevealCursor> {
        self.cursor.as_ref()
    }

    /// Start revealing `text` as a new bot message. Any reveal still running
    /// is cut short first so two streams never interleave.
    pub fn begin(&mut self, text: &str) {
        self.cancel();
        self.generation += 1;
        self.cursor = Some(RevealCursor::new(text));
        self.sink.emit(ChatEvent::BotMessageStarted {
            sent_at: chrono::Local::now(),
        });
        self.timer.post(UiTask::RevealStep {
            generation: self.generation,
        });
    }

    /// Finalize the partial message of an in-flight reveal, if any. Its
    /// pending step becomes stale.
    pub fn cancel(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            debug!(
                "Reveal cut short at {}/{} chars",
                cursor.position(),
                cursor.len()
            );
            self.generation += 1;
            self.sink.emit(ChatEvent::MessageFinalized);
        }
    }

    pub fn on_step(&mut self, generation: u64) -> Step {
        if generation != self.generation {
            return Step::Ignored;
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Step::Ignored;
        };

        match cursor.advance() {
            Some(ch) => {
                self.sink.emit(ChatEvent::CharRevealed(ch));
                let delay = self.timing.next_delay(&mut self.rng);
                self.timer.schedule(
                    delay,
                    UiTask::RevealStep {
                        generation: self.generation,
                    },
                );
                Step::Revealed
            }
            None => {
                self.cursor = None;
                self.sink.emit(ChatEvent::MessageFinalized);
                Step::Finished
            }
        }
    }
}
