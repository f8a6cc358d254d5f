//! Session loop — the single cooperative UI loop that owns the controller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::controller::{ConversationController, Flow};
use crate::engine::ReplyEngine;
use crate::events::{ChatEvent, EventSink};
use crate::timer::Timer;
use crate::types::UiTask;

/// Frontend side of a running session.
pub struct SessionHandle {
    queue: Timer,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn submit(&self, text: impl Into<String>) {
        self.queue.post(UiTask::Submit(text.into()));
    }

    pub fn shutdown(&self) {
        self.queue.post(UiTask::Shutdown);
    }

    /// Everything emitted since the last call, without waiting.
    pub fn drain_events(&mut self) -> Vec<ChatEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit (after a farewell or `shutdown`).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

pub struct ChatSession;

impl ChatSession {
    /// Start the loop on the current runtime. The greeting, if configured,
    /// starts revealing right away.
    pub fn spawn(config: Config, engine: Arc<dyn ReplyEngine>) -> SessionHandle {
        let (queue, rx) = Timer::channel();
        let (sink, events) = EventSink::channel();
        let controller = ConversationController::new(config, engine, queue.clone(), sink);
        let task = tokio::spawn(run(controller, rx));
        SessionHandle {
            queue,
            events,
            task,
        }
    }
}

async fn run(mut controller: ConversationController, mut rx: mpsc::UnboundedReceiver<UiTask>) {
    info!("Session started");
    controller.greet();
    while let Some(task) = rx.recv().await {
        if controller.handle(task) == Flow::Exit {
            break;
        }
    }
    info!("Session ended");
}
