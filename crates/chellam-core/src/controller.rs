//! Turn-taking — echo, typing indicator, worker dispatch, reveal, exit path.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::{BusyPolicy, Config};
use crate::engine::ReplyEngine;
use crate::events::{ChatEvent, EventSink};
use crate::indicator::TypingIndicator;
use crate::reveal::{RevealScheduler, RevealTiming, Step};
use crate::timer::Timer;
use crate::types::{Completion, TurnId, UiTask};
use crate::worker::ReplyWorker;

/// Where the current turn is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingReply(TurnId),
    Revealing,
    /// Farewell sent, shutdown scheduled
    Closing,
}

/// What happened to one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// Blank input
    Ignored,
    /// Busy, and the policy is to drop
    Rejected,
    /// Busy, will run when the current turn is done
    Queued,
    Dispatched(TurnId),
    Farewell,
}

/// Whether the session loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct ConversationController {
    config: Config,
    sink: EventSink,
    timer: Timer,
    indicator: TypingIndicator,
    reveal: RevealScheduler,
    worker: ReplyWorker,
    phase: TurnPhase,
    backlog: VecDeque<String>,
    next_turn: TurnId,
}

impl ConversationController {
    pub fn new(
        config: Config,
        engine: Arc<dyn ReplyEngine>,
        timer: Timer,
        sink: EventSink,
    ) -> Self {
        let mut seeds = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let reveal_rng = StdRng::seed_from_u64(seeds.next_u64());
        let worker_rng = StdRng::seed_from_u64(seeds.next_u64());

        let indicator =
            TypingIndicator::new(config.typing_interval(), timer.clone(), sink.clone());
        let reveal = RevealScheduler::new(
            RevealTiming::from_config(&config),
            reveal_rng,
            timer.clone(),
            sink.clone(),
        );
        let worker = ReplyWorker::new(engine, &config, worker_rng, timer.clone());

        Self {
            config,
            sink,
            timer,
            indicator,
            reveal,
            worker,
            phase: TurnPhase::Idle,
            backlog: VecDeque::new(),
            next_turn: 1,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Reveal the opening line, if one is configured.
    pub fn greet(&mut self) {
        if let Some(greeting) = self.config.greeting.clone() {
            self.phase = TurnPhase::Revealing;
            self.reveal.begin(&greeting);
        }
    }

    /// Route one UI task. Only the session loop calls this.
    pub fn handle(&mut self, task: UiTask) -> Flow {
        match task {
            UiTask::Submit(text) => {
                self.submit(&text);
            }
            UiTask::IndicatorTick { generation } => {
                self.indicator.on_tick(generation);
            }
            UiTask::RevealStep { generation } => {
                if self.reveal.on_step(generation) == Step::Finished {
                    self.on_reveal_finished();
                }
            }
            UiTask::ReplyReady(completion) => self.on_reply_ready(completion),
            UiTask::Shutdown => {
                info!("Session shutting down");
                self.indicator.stop();
                self.reveal.cancel();
                self.sink.emit(ChatEvent::Closed);
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    pub fn submit(&mut self, raw: &str) -> Submitted {
        let text = raw.trim();
        if text.is_empty() {
            return Submitted::Ignored;
        }

        match self.phase {
            TurnPhase::Idle => {
                self.echo(text);
                self.start_turn(text.to_string())
            }
            TurnPhase::Closing => {
                debug!("Ignoring submission while closing");
                Submitted::Ignored
            }
            _ => match self.config.busy_policy {
                BusyPolicy::Queue => {
                    debug!("Busy; queued submission ({} waiting)", self.backlog.len() + 1);
                    self.echo(text);
                    self.backlog.push_back(text.to_string());
                    Submitted::Queued
                }
                BusyPolicy::Reject => {
                    debug!("Busy; rejected submission");
                    self.sink.emit(ChatEvent::SubmissionRejected {
                        text: text.to_string(),
                    });
                    Submitted::Rejected
                }
            },
        }
    }

    fn echo(&self, text: &str) {
        self.sink.emit(ChatEvent::UserMessage {
            text: text.to_string(),
            sent_at: chrono::Local::now(),
        });
    }

    /// Farewell or dispatch for a submission that has already been echoed.
    fn start_turn(&mut self, text: String) -> Submitted {
        if self.config.is_exit_keyword(&text) {
            info!("Exit keyword received; closing in {:?}", self.config.exit_delay());
            self.phase = TurnPhase::Closing;
            self.backlog.clear();
            let farewell = self.config.farewell.clone();
            self.reveal.begin(&farewell);
            self.timer.schedule(self.config.exit_delay(), UiTask::Shutdown);
            self.sink.emit(ChatEvent::ShutdownScheduled {
                delay_ms: self.config.exit_delay_ms,
            });
            return Submitted::Farewell;
        }

        let turn = self.next_turn;
        self.next_turn += 1;
        self.phase = TurnPhase::AwaitingReply(turn);
        self.indicator.start();
        self.worker.submit(turn, &self.config.session_id, &text);
        debug!("Turn {} dispatched", turn);
        Submitted::Dispatched(turn)
    }

    fn on_reply_ready(&mut self, completion: Completion) {
        if self.phase != TurnPhase::AwaitingReply(completion.turn) {
            warn!(
                "Dropping reply for turn {} (phase {:?})",
                completion.turn, self.phase
            );
            return;
        }
        if completion.fallback {
            info!("Turn {}: showing fallback reply", completion.turn);
        }
        self.indicator.stop();
        self.indicator.clear();
        self.phase = TurnPhase::Revealing;
        self.reveal.begin(&completion.text);
    }

    fn on_reveal_finished(&mut self) {
        if self.phase != TurnPhase::Revealing {
            // Farewell finished; shutdown is already scheduled
            return;
        }
        self.phase = TurnPhase::Idle;
        if let Some(next) = self.backlog.pop_front() {
            self.start_turn(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn config() -> Config {
        Config {
            greeting: None,
            reply_timeout_ms: None,
            rng_seed: Some(11),
            ..Config::default()
        }
    }

    fn controller(
        config: Config,
    ) -> (
        ConversationController,
        UnboundedReceiver<UiTask>,
        UnboundedReceiver<ChatEvent>,
    ) {
        let (timer, tasks) = Timer::channel();
        let (sink, events) = EventSink::channel();
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|_: &str, text: &str| -> anyhow::Result<String> { Ok(format!("re: {}", text)) });
        (
            ConversationController::new(config, engine, timer, sink),
            tasks,
            events,
        )
    }

    fn drain(events: &mut UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut out = Vec::new();
        while let Ok(event) = events.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_is_noop() {
        let (mut c, _tasks, mut events) = controller(config());
        assert_eq!(c.submit("   \n\t"), Submitted::Ignored);
        assert_eq!(c.submit(""), Submitted::Ignored);
        assert!(drain(&mut events).is_empty());
        assert_eq!(c.phase(), TurnPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_echo_precedes_indicator() {
        let (mut c, _tasks, mut events) = controller(config());
        assert_eq!(c.submit("  hello  "), Submitted::Dispatched(1));

        let events = drain(&mut events);
        match &events[0] {
            ChatEvent::UserMessage { text, .. } => assert_eq!(text, "hello"),
            other => panic!("expected user message first, got {:?}", other),
        }
        assert_eq!(events[1], ChatEvent::TypingStarted);
        assert_eq!(c.phase(), TurnPhase::AwaitingReply(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_keyword_bypasses_worker() {
        for word in ["BYE", "Bye", "bye", "quit", "Exit"] {
            let (mut c, _tasks, mut events) = controller(config());
            assert_eq!(c.submit(word), Submitted::Farewell);
            let events = drain(&mut events);
            assert!(!events.contains(&ChatEvent::TypingStarted));
            assert!(events.contains(&ChatEvent::ShutdownScheduled { delay_ms: 1500 }));
            assert_eq!(c.phase(), TurnPhase::Closing);
        }

        let (mut c, _tasks, _events) = controller(config());
        assert_eq!(c.submit("goodbye"), Submitted::Dispatched(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submissions_after_farewell_ignored() {
        let (mut c, _tasks, _events) = controller(config());
        c.submit("bye");
        assert_eq!(c.submit("wait, one more"), Submitted::Ignored);
        assert_eq!(c.backlog_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_queue_policy() {
        let (mut c, _tasks, mut events) = controller(config());
        c.submit("first");
        drain(&mut events);

        assert_eq!(c.submit("  second "), Submitted::Queued);
        assert_eq!(c.backlog_len(), 1);

        // Echoed right away; only the dispatch waits
        let events = drain(&mut events);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ChatEvent::UserMessage { text, .. } => assert_eq!(text, "second"),
            other => panic!("expected the queued echo, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_turn_dispatches_without_second_echo() {
        let (mut c, mut tasks, mut events) = controller(config());
        c.submit("first");
        c.submit("second");
        c.handle(UiTask::ReplyReady(Completion {
            turn: 1,
            text: "ok".into(),
            fallback: false,
        }));
        while c.backlog_len() > 0 {
            let task = tasks.recv().await.unwrap();
            c.handle(task);
        }
        assert_eq!(c.phase(), TurnPhase::AwaitingReply(2));

        let echoes = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, ChatEvent::UserMessage { .. }))
            .count();
        assert_eq!(echoes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_reject_policy() {
        let (mut c, _tasks, mut events) = controller(Config {
            busy_policy: BusyPolicy::Reject,
            ..config()
        });
        c.submit("first");
        drain(&mut events);

        assert_eq!(c.submit("second"), Submitted::Rejected);
        assert_eq!(
            drain(&mut events),
            vec![ChatEvent::SubmissionRejected {
                text: "second".into()
            }]
        );
        assert_eq!(c.backlog_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_completion_dropped() {
        let (mut c, _tasks, mut events) = controller(config());
        c.submit("hello");
        drain(&mut events);

        c.handle(UiTask::ReplyReady(Completion {
            turn: 99,
            text: "not yours".into(),
            fallback: false,
        }));
        assert!(drain(&mut events).is_empty());
        assert_eq!(c.phase(), TurnPhase::AwaitingReply(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_stops_indicator_before_reveal() {
        let (mut c, _tasks, mut events) = controller(config());
        c.submit("hello");
        drain(&mut events);

        c.handle(UiTask::ReplyReady(Completion {
            turn: 1,
            text: "Hi".into(),
            fallback: false,
        }));
        let events = drain(&mut events);
        assert_eq!(events[0], ChatEvent::TypingStopped);
        assert_eq!(events[1], ChatEvent::Indicator(String::new()));
        assert!(matches!(events[2], ChatEvent::BotMessageStarted { .. }));
        assert_eq!(c.phase(), TurnPhase::Revealing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_makes_session_busy() {
        let (mut c, _tasks, _events) = controller(Config {
            greeting: Some("Hello!".into()),
            ..config()
        });
        c.greet();
        assert_eq!(c.phase(), TurnPhase::Revealing);
        assert_eq!(c.submit("hi"), Submitted::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_exits_loop() {
        let (mut c, _tasks, mut events) = controller(config());
        assert_eq!(c.handle(UiTask::Shutdown), Flow::Exit);
        assert_eq!(drain(&mut events), vec![ChatEvent::Closed]);
    }
}
