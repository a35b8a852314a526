//! Progress reporting and timing for generation attempts.

mod reporter;
mod schedule;
mod scheduler;
mod timer;

pub use reporter::{approximate_words, ProgressMode, ProgressReporter, IN_FLIGHT_CEILING};
pub use schedule::{completion_label, Checkpoint, ProgressSchedule};
pub use scheduler::{Scheduler, TickFn, TickHandle, TokioScheduler};
pub use timer::ElapsedTimer;
