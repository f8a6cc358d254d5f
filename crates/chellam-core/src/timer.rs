//! Timer facility for the UI loop — fire-once delayed posts into the task queue.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::types::UiTask;

/// Handle onto the UI task queue. Everything that wants to run "on the UI
/// loop later" goes through here, so the loop stays the only owner of state.
#[derive(Debug, Clone)]
pub struct Timer {
    tx: mpsc::UnboundedSender<UiTask>,
}

impl Timer {
    pub fn new(tx: mpsc::UnboundedSender<UiTask>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a task to run on the next loop iteration.
    pub fn post(&self, task: UiTask) {
        // Closed queue means the loop has exited; nothing left to run it
        let _ = self.tx.send(task);
    }

    /// Queue a task after `delay`. Fire-once; callers reschedule themselves.
    pub fn schedule(&self, delay: Duration, task: UiTask) {
        if delay.is_zero() {
            self.post(task);
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(task);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_once_after_delay() {
        let (timer, mut rx) = Timer::channel();
        timer.schedule(Duration::from_millis(400), UiTask::Shutdown);

        tokio::time::sleep(Duration::from_millis(399)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().unwrap(), UiTask::Shutdown);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_is_immediate() {
        let (timer, mut rx) = Timer::channel();
        timer.post(UiTask::RevealStep { generation: 3 });
        assert_eq!(rx.try_recv().unwrap(), UiTask::RevealStep { generation: 3 });
    }
}
