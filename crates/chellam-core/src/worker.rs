//! Reply worker — runs the engine call off the UI loop and posts the result back.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::ReplyEngine;
use crate::timer::Timer;
use crate::types::{Completion, TurnId, UiTask};

/// Simulated "thinking" time before the engine is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkLatency {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ThinkLatency {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_ms: config.think_min_ms,
            max_ms: config.think_max_ms,
        }
    }

    pub fn sample(&self, rng: &mut impl Rng) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

pub struct ReplyWorker {
    engine: Arc<dyn ReplyEngine>,
    latency: ThinkLatency,
    timeout: Option<Duration>,
    fallback_reply: String,
    rng: StdRng,
    queue: Timer,
    /// One engine call at a time, including calls abandoned by a timeout
    gate: Arc<Semaphore>,
}

impl ReplyWorker {
    pub fn new(
        engine: Arc<dyn ReplyEngine>,
        config: &Config,
        rng: StdRng,
        queue: Timer,
    ) -> Self {
        Self {
            engine,
            latency: ThinkLatency::from_config(config),
            timeout: config.reply_timeout(),
            fallback_reply: config.fallback_reply.clone(),
            rng,
            queue,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    /// Fire-and-forget. The completion arrives later as
    /// `UiTask::ReplyReady` on the UI queue, fallback included on failure.
    pub fn submit(&mut self, turn: TurnId, session_id: &str, text: &str) {
        let think = self.latency.sample(&mut self.rng);
        let engine = Arc::clone(&self.engine);
        let timeout = self.timeout;
        let fallback_reply = self.fallback_reply.clone();
        let queue = self.queue.clone();
        let gate = Arc::clone(&self.gate);
        let session_id = session_id.to_string();
        let text = text.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(think).await;

            if gate.available_permits() == 0 {
                debug!("Turn {}: waiting for the previous engine call", turn);
            }
            let call = async move {
                let permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return Ok(Err(anyhow::Error::new(e))),
                };
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    engine.reply(&session_id, &text)
                })
                .await
            };
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        warn!("Turn {}: reply engine timed out after {:?}", turn, limit);
                        queue.post(UiTask::ReplyReady(Completion {
                            turn,
                            text: fallback_reply,
                            fallback: true,
                        }));
                        return;
                    }
                },
                None => call.await,
            };

            let completion = match outcome {
                Ok(Ok(reply)) if !reply.trim().is_empty() => {
                    info!("Turn {}: reply ready ({} chars)", turn, reply.chars().count());
                    Completion {
                        turn,
                        text: reply,
                        fallback: false,
                    }
                }
                Ok(Ok(_)) => {
                    warn!("Turn {}: reply engine returned a blank reply", turn);
                    Completion {
                        turn,
                        text: fallback_reply,
                        fallback: true,
                    }
                }
                Ok(Err(e)) => {
                    warn!("Turn {}: reply engine failed: {:#}", turn, e);
                    Completion {
                        turn,
                        text: fallback_reply,
                        fallback: true,
                    }
                }
                Err(e) => {
                    error!("Turn {}: reply engine panicked: {}", turn, e);
                    Completion {
                        turn,
                        text: fallback_reply,
                        fallback: true,
                    }
                }
            };
            queue.post(UiTask::ReplyReady(completion));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn config() -> Config {
        Config {
            think_min_ms: 500,
            think_max_ms: 1500,
            reply_timeout_ms: None,
            fallback_reply: "Oops.".into(),
            ..Config::default()
        }
    }

    fn worker(engine: Arc<dyn ReplyEngine>, config: &Config) -> (ReplyWorker, UnboundedReceiver<UiTask>) {
        let (timer, rx) = Timer::channel();
        (
            ReplyWorker::new(engine, config, StdRng::seed_from_u64(3), timer),
            rx,
        )
    }

    async fn completion(rx: &mut UnboundedReceiver<UiTask>) -> Completion {
        match rx.recv().await {
            Some(UiTask::ReplyReady(c)) => c,
            other => panic!("expected a completion, got {:?}", other),
        }
    }

    #[test]
    fn test_latency_in_range() {
        let latency = ThinkLatency {
            min_ms: 500,
            max_ms: 1500,
        };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            let d = latency.sample(&mut rng);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_degenerate_latency() {
        let latency = ThinkLatency { min_ms: 0, max_ms: 0 };
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(latency.sample(&mut rng), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_posted_after_think_latency() {
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|session: &str, text: &str| -> anyhow::Result<String> {
                Ok(format!("{}:{}", session, text))
            });
        let (mut w, mut rx) = worker(engine, &config());

        let start = tokio::time::Instant::now();
        w.submit(7, "localuser", "hello");
        let c = completion(&mut rx).await;

        assert_eq!(c.turn, 7);
        assert_eq!(c.text, "localuser:hello");
        assert!(!c.fallback);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_error_gives_fallback() {
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|_: &str, _: &str| -> anyhow::Result<String> { anyhow::bail!("brain offline") });
        let (mut w, mut rx) = worker(engine, &config());

        w.submit(1, "localuser", "hello");
        let c = completion(&mut rx).await;
        assert_eq!(c.text, "Oops.");
        assert!(c.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_panic_gives_fallback() {
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|_: &str, _: &str| -> anyhow::Result<String> { panic!("corrupt brain") });
        let (mut w, mut rx) = worker(engine, &config());

        w.submit(1, "localuser", "hello");
        let c = completion(&mut rx).await;
        assert_eq!(c.text, "Oops.");
        assert!(c.fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_reply_gives_fallback() {
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|_: &str, _: &str| -> anyhow::Result<String> { Ok("   ".into()) });
        let (mut w, mut rx) = worker(engine, &config());

        w.submit(1, "localuser", "hello");
        assert!(completion(&mut rx).await.fallback);
    }

    #[tokio::test]
    async fn test_slow_engine_times_out() {
        let config = Config {
            think_min_ms: 0,
            think_max_ms: 0,
            reply_timeout_ms: Some(20),
            ..config()
        };
        let engine: Arc<dyn ReplyEngine> =
            Arc::new(|_: &str, _: &str| -> anyhow::Result<String> {
                std::thread::sleep(Duration::from_millis(300));
                Ok("too late".into())
            });
        let (mut w, mut rx) = worker(engine, &config);

        w.submit(2, "localuser", "hello");
        let c = completion(&mut rx).await;
        assert_eq!(c.turn, 2);
        assert!(c.fallback);
        assert_eq!(c.text, "Oops.");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_call_still_blocks_next_call() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let config = Config {
            think_min_ms: 0,
            think_max_ms: 0,
            reply_timeout_ms: Some(20),
            ..config()
        };
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let engine: Arc<dyn ReplyEngine> = {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            Arc::new(move |_: &str, _: &str| -> anyhow::Result<String> {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(400));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok("late".into())
            })
        };
        let (mut w, mut rx) = worker(engine, &config);

        w.submit(1, "localuser", "one");
        assert!(completion(&mut rx).await.fallback);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // First call is still running on the blocking pool
        w.submit(2, "localuser", "two");
        let c = completion(&mut rx).await;
        assert_eq!(c.turn, 2);
        assert!(c.fallback);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }
}
