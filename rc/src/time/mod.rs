//! Clocks and timers
//!
//! - [`clocks`] - paired monotonic/wall-clock readings and unit conversion
//! - [`timer`] - the `Scheduler` seam and resettable `Timer` handles
//! - [`virtual_clock`] - deterministic virtual time for tests and replay
//! - [`tokio_scheduler`] - tokio-backed timers for native hosts

mod clocks;
mod timer;
mod tokio_scheduler;
mod virtual_clock;

pub use clocks::{
    Clock, ClocksState, RelativeTime, ServerDuration, SystemClock, TimeStamp, duration_from_millis, elapsed,
    to_server_duration,
};
pub use timer::{Scheduler, Timer, TimerId};
pub use tokio_scheduler::TokioScheduler;
pub use virtual_clock::VirtualScheduler;
