//! Cancellable periodic tasks.
//!
//! A [`ScheduledTask`] runs an async job at a fixed period until its handle
//! is dropped. Phases that need a timer (health polling, the elapsed
//! counter) hold the handle for exactly as long as they are active, so a
//! phase change can never leave a timer running.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a periodic job. Dropping it aborts the job.
#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Run `job` every `period`, first after one full period.
    ///
    /// Runs never overlap: a slow run delays the next one.
    pub fn every<F, Fut>(period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                job().await;
            }
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
