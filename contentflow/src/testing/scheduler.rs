//! Manually driven scheduler for deterministic tick tests.

use crate::progress::{Scheduler, TickFn, TickHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Entry {
    interval: Duration,
    next_due: Duration,
    cancelled: Arc<AtomicBool>,
    tick: TickFn,
}

#[derive(Default)]
struct Clock {
    now: Duration,
    entries: Vec<Entry>,
}

/// Scheduler whose clock only moves when [`ManualScheduler::advance`] is
/// called.
///
/// Due ticks fire in time order on the calling thread. The internal lock is
/// never held while a tick runs, so ticks may register or cancel other ticks.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<Clock>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("entries", &clock.entries.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Creates a scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Returns the number of live registrations.
    #[must_use]
    pub fn active(&self) -> usize {
        let mut clock = self.clock.lock();
        clock.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
        clock.entries.len()
    }

    /// Moves the clock forward by `by`, firing every tick that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.lock().now + by;

        loop {
            let mut entry = {
                let mut clock = self.clock.lock();
                clock.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
                let due = clock
                    .entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.next_due <= target)
                    .min_by_key(|(_, e)| e.next_due)
                    .map(|(i, _)| i);
                let Some(index) = due else {
                    clock.now = target;
                    return;
                };
                let entry = clock.entries.swap_remove(index);
                clock.now = entry.next_due;
                entry
            };

            (entry.tick)();
            entry.next_due += entry.interval;

            if !entry.cancelled.load(Ordering::SeqCst) {
                self.clock.lock().entries.push(entry);
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn every(&self, interval: Duration, tick: TickFn) -> TickHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut clock = self.clock.lock();
        let next_due = clock.now + interval.max(Duration::from_millis(1));
        clock.entries.push(Entry {
            interval: interval.max(Duration::from_millis(1)),
            next_due,
            cancelled: cancelled.clone(),
            tick,
        });
        TickHandle::new(cancelled)
    }
}
