//! Cancellable timers that post a message into the session channel.
//!
//! A `ScheduledTask` is owned by whoever scheduled it. Replacing the owning
//! `Option` or dropping it cancels the timer, so at most one instance of a
//! given timer exists per owner.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Send `msg` once after `delay`.
    pub fn once<M: Send + 'static>(delay: Duration, tx: mpsc::Sender<M>, msg: M) -> Self {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = time::sleep(delay) => {
                    let _ = tx.send(msg).await;
                }
            }
        });
        Self { token, handle }
    }

    /// Send `make()` every `period`, first after one full period.
    pub fn every<M, F>(period: Duration, tx: mpsc::Sender<M>, mut make: F) -> Self
    where
        M: Send + 'static,
        F: FnMut() -> M + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(make()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self { token, handle }
    }

}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn once_fires_after_delay() {
        let (tx, mut rx) = mpsc::channel(4);
        let _task = ScheduledTask::once(Duration::from_secs(10), tx, 7u32);
        tokio::task::yield_now().await;

        time::advance(Duration::from_secs(9)).await;
        assert!(rx.try_recv().is_err());

        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_cancels() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let task = ScheduledTask::once(Duration::from_secs(10), tx, 1);
        tokio::task::yield_now().await;
        drop(task);

        // The task exits without sending and drops its sender.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn every_repeats_until_dropped() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut n = 0u32;
        let task = ScheduledTask::every(Duration::from_secs(30), tx, move || {
            n += 1;
            n
        });

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
        drop(task);
        assert_eq!(rx.recv().await, None);
    }
}
