//! Cancellable, resettable delays
//!
//! A [`Scheduler`] is whatever runs deferred callbacks for the host (virtual
//! time in tests and replay, a tokio `LocalSet` in native hosts). [`Timer`] wraps
//! one logical delay on top of it with `reset()`/`cancel()` semantics.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

/// Identifier of one scheduled callback
pub type TimerId = u64;

/// Deferred callback runner
pub trait Scheduler {
    /// Run `callback` once after `delay`
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Forget a scheduled callback; unknown or already-fired ids are ignored
    fn clear_timeout(&self, id: TimerId);
}

/// A named delay that can be re-armed and cancelled
///
/// Dropping the handle cancels any pending firing.
pub struct Timer {
    scheduler: Rc<dyn Scheduler>,
    delay: Duration,
    callback: Rc<dyn Fn()>,
    armed: Rc<Cell<Option<TimerId>>>,
}

impl Timer {
    /// Create an unarmed timer
    pub fn new(scheduler: Rc<dyn Scheduler>, delay: Duration, callback: impl Fn() + 'static) -> Self {
        debug!(?delay, "Timer::new: called");
        Self {
            scheduler,
            delay,
            callback: Rc::new(callback),
            armed: Rc::new(Cell::new(None)),
        }
    }

    /// Create and arm
    pub fn start(scheduler: Rc<dyn Scheduler>, delay: Duration, callback: impl Fn() + 'static) -> Self {
        let timer = Self::new(scheduler, delay, callback);
        timer.reset();
        timer
    }

    /// (Re-)arm the timer for a full delay from now
    pub fn reset(&self) {
        self.cancel();
        let callback = Rc::clone(&self.callback);
        let armed = Rc::clone(&self.armed);
        let id = self.scheduler.set_timeout(
            self.delay,
            Box::new(move || {
                armed.set(None);
                callback();
            }),
        );
        self.armed.set(Some(id));
    }

    /// Disarm; no-op when not armed
    pub fn cancel(&self) {
        if let Some(id) = self.armed.take() {
            debug!(id, "Timer::cancel: clearing pending timeout");
            self.scheduler.clear_timeout(id);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get().is_some()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}
