//! Elapsed stopwatch bound to a generation attempt.

use super::scheduler::{Scheduler, TickHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ticking stopwatch shown while an attempt runs.
///
/// Purely informational: it never cancels or times out an attempt.
/// It is stopped and discarded when the attempt leaves `running`.
#[derive(Debug)]
pub struct ElapsedTimer {
    seconds: Arc<AtomicU64>,
    handle: TickHandle,
}

impl ElapsedTimer {
    /// Starts at zero and increments once per `tick`.
    ///
    /// `on_tick` receives the new count after each increment.
    pub fn start<F>(scheduler: &dyn Scheduler, tick: Duration, on_tick: F) -> Self
    where
        F: Fn(u64) + Send + 'static,
    {
        let seconds = Arc::new(AtomicU64::new(0));
        let counter = seconds.clone();
        let handle = scheduler.every(
            tick,
            Box::new(move || {
                let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
                on_tick(now);
            }),
        );

        Self { seconds, handle }
    }

    /// Returns the elapsed seconds so far.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }

    /// Stops the timer and returns the final count.
    pub fn stop(self) -> u64 {
        self.handle.cancel();
        self.elapsed_secs()
    }

    /// Formats seconds as `m:ss`.
    #[must_use]
    pub fn format(seconds: u64) -> String {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}
