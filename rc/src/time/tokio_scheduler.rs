//! Scheduler backed by tokio timers on a `LocalSet`
//!
//! Callbacks are not `Send`, so every timer is a `spawn_local` task; the
//! scheduler must be used from inside `LocalSet::run_until` (or a
//! current-thread runtime driving a `LocalSet`).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::timer::{Scheduler, TimerId};

/// Tokio-driven [`Scheduler`] for native hosts
#[derive(Default)]
pub struct TokioScheduler {
    next_id: Cell<TimerId>,
    tasks: Rc<RefCell<HashMap<TimerId, JoinHandle<()>>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        debug!("TokioScheduler::new: called");
        Self::default()
    }

    /// Timers spawned and not yet fired or cleared
    pub fn pending_timers(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Scheduler for TokioScheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let tasks = Rc::downgrade(&self.tasks);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            if let Some(tasks) = tasks.upgrade() {
                tasks.borrow_mut().remove(&id);
            }
            callback();
        });
        self.tasks.borrow_mut().insert(id, handle);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(handle) = self.tasks.borrow_mut().remove(&id) {
            debug!(id, "TokioScheduler::clear_timeout: aborting timer task");
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.borrow_mut().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Timer;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires_after_delay() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let scheduler: Rc<dyn Scheduler> = Rc::new(TokioScheduler::new());
                let fired = Rc::new(Cell::new(false));
                let flag = Rc::clone(&fired);
                let _timer = Timer::start(scheduler, Duration::from_millis(100), move || flag.set(true));

                tokio::time::sleep(Duration::from_millis(50)).await;
                assert!(!fired.get());

                tokio::time::sleep(Duration::from_millis(60)).await;
                assert!(fired.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_cancel_aborts_task() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let scheduler = Rc::new(TokioScheduler::new());
                let fired = Rc::new(Cell::new(false));
                let flag = Rc::clone(&fired);
                let timer = Timer::start(scheduler.clone(), Duration::from_millis(100), move || flag.set(true));
                assert_eq!(scheduler.pending_timers(), 1);

                timer.cancel();
                assert_eq!(scheduler.pending_timers(), 0);

                tokio::time::sleep(Duration::from_millis(200)).await;
                assert!(!fired.get());
            })
            .await;
    }
}
