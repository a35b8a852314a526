//! Injectable fixed-interval tick scheduling.
//!
//! Simulated progress and the elapsed timer never touch wall-clock APIs
//! directly; they ask a [`Scheduler`] to call them back every `interval`.
//! Production code uses [`TokioScheduler`]; tests can use
//! [`crate::testing::ManualScheduler`] or tokio's paused clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::warn;

/// A repeating tick callback.
pub type TickFn = Box<dyn FnMut() + Send + 'static>;

/// Capability to run a callback on a fixed interval.
pub trait Scheduler: Send + Sync {
    /// Calls `tick` every `interval`, first after one full interval.
    ///
    /// Ticking stops when the returned handle is cancelled or dropped.
    fn every(&self, interval: Duration, tick: TickFn) -> TickHandle;
}

/// Handle to a repeating tick registration.
///
/// Cancellation is idempotent. Dropping the handle cancels it.
#[derive(Debug)]
pub struct TickHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TickHandle {
    /// Creates a handle around a shared cancellation flag.
    #[must_use]
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            abort: None,
        }
    }

    /// Attaches the task driving the ticks so cancelling also aborts it.
    #[must_use]
    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    /// A handle that was never scheduled.
    #[must_use]
    pub fn inert() -> Self {
        Self::new(Arc::new(AtomicBool::new(true)))
    }

    /// Stops further ticks.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(ref abort) = self.abort {
            abort.abort();
        }
    }

    /// Returns whether ticking has been stopped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Scheduler backed by `tokio::time::interval`.
///
/// Honors `tokio::time::pause`, so tests can advance virtual time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn every(&self, interval: Duration, mut tick: TickFn) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available; ticks will not fire");
            return TickHandle::inert();
        };

        let flag = cancelled.clone();
        let task = runtime.spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                tick();
            }
        });

        TickHandle::new(cancelled).with_abort(task.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_tick(counter: &Arc<AtomicUsize>) -> TickFn {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_ticks_on_interval() {
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle = TokioScheduler.every(Duration::from_secs(1), counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler.every(Duration::from_secs(1), counting_tick(&counter));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let counter = Arc::new(AtomicUsize::new(0));
        drop(TokioScheduler.every(Duration::from_secs(1), counting_tick(&counter)));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_inert_handle_is_cancelled() {
        assert!(TickHandle::inert().is_cancelled());
    }
}
