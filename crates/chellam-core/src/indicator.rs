//! "Typing..." indicator — a four-frame cycle driven by its own repeating timer.

use std::time::Duration;

use crate::events::{ChatEvent, EventSink};
use crate::timer::Timer;
use crate::types::{TypingState, UiTask};

const LABEL: &str = "Typing";

/// Indicator label for a phase: "Typing" followed by `phase` dots.
pub fn indicator_text(phase: u8) -> String {
    format!("{}{}", LABEL, ".".repeat(usize::from(phase % 4)))
}

pub struct TypingIndicator {
    state: TypingState,
    interval: Duration,
    /// Bumped on every `start()` so ticks armed by an earlier run are dropped.
    generation: u64,
    timer: Timer,
    sink: EventSink,
}

impl TypingIndicator {
    pub fn new(interval: Duration, timer: Timer, sink: EventSink) -> Self {
        Self {
            state: TypingState::default(),
            interval,
            generation: 0,
            timer,
            sink,
        }
    }

    pub fn state(&self) -> TypingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn start(&mut self) {
        self.generation += 1;
        self.state = TypingState {
            active: true,
            phase: 0,
        };
        self.sink.emit(ChatEvent::TypingStarted);
        self.sink.emit(ChatEvent::Indicator(indicator_text(0)));
        self.arm();
    }

    /// Marks the indicator inactive. The pending tick notices on arrival and
    /// does not rearm. The label is left as is; see [`clear`](Self::clear).
    pub fn stop(&mut self) {
        if !self.state.active {
            return;
        }
        self.state.active = false;
        self.sink.emit(ChatEvent::TypingStopped);
    }

    pub fn clear(&self) {
        self.sink.emit(ChatEvent::Indicator(String::new()));
    }

    /// Handle one timer tick. Returns false when the tick was the terminal one
    /// (indicator stopped, or the tick belongs to an older run).
    pub fn on_tick(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.state.active {
            return false;
        }
        self.state.phase = (self.state.phase + 1) % 4;
        self.sink
            .emit(ChatEvent::Indicator(indicator_text(self.state.phase)));
        self.arm();
        true
    }

    fn arm(&self) {
        self.timer.schedule(
            self.interval,
            UiTask::IndicatorTick {
                generation: self.generation,
            },
        );
    }
}
