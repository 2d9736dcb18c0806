//! Deterministic virtual time
//!
//! [`VirtualScheduler`] is both the [`Clock`] and the [`Scheduler`]: time only
//! moves when the host calls [`VirtualScheduler::advance`], and due timers fire
//! in deadline order with the clock set to their deadline.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use super::clocks::{Clock, ClocksState, RelativeTime, TimeStamp};
use super::timer::{Scheduler, TimerId};

struct VirtualState {
    now: RelativeTime,
    origin: TimeStamp,
    next_id: TimerId,
    queue: BTreeMap<(RelativeTime, TimerId), Box<dyn FnOnce()>>,
    deadlines: HashMap<TimerId, RelativeTime>,
}

/// Manually driven clock and timer queue; clones share state
#[derive(Clone)]
pub struct VirtualScheduler {
    state: Rc<RefCell<VirtualState>>,
}

impl VirtualScheduler {
    /// Virtual page whose time origin sits at `origin` on the wall clock
    pub fn new(origin: TimeStamp) -> Self {
        debug!(origin = origin.0, "VirtualScheduler::new: called");
        Self {
            state: Rc::new(RefCell::new(VirtualState {
                now: RelativeTime::ZERO,
                origin,
                next_id: 1,
                queue: BTreeMap::new(),
                deadlines: HashMap::new(),
            })),
        }
    }

    /// Move time forward, firing every timer that falls due on the way
    pub fn advance(&self, by: Duration) {
        let target = self.state.borrow().now.saturating_add(by);
        self.advance_to(target);
    }

    /// Move time forward to `target`; a target in the past is a no-op
    pub fn advance_to(&self, target: RelativeTime) {
        debug!(target_ms = target.as_millis_f64(), "VirtualScheduler::advance_to: called");
        loop {
            let due = {
                let mut state = self.state.borrow_mut();
                let next_key = state.queue.keys().next().copied();
                match next_key {
                    Some(key) if key.0 <= target => {
                        state.deadlines.remove(&key.1);
                        if key.0 > state.now {
                            state.now = key.0;
                        }
                        state.queue.remove(&key)
                    }
                    _ => None,
                }
            };
            match due {
                Some(callback) => callback(),
                None => break,
            }
        }
        let mut state = self.state.borrow_mut();
        if target > state.now {
            state.now = target;
        }
    }

    /// Number of timers still waiting to fire
    pub fn pending_timers(&self) -> usize {
        self.state.borrow().queue.len()
    }
}

impl Clock for VirtualScheduler {
    fn now(&self) -> ClocksState {
        let state = self.state.borrow();
        ClocksState {
            relative: state.now,
            time_stamp: state.origin.offset_by(state.now),
        }
    }

    fn time_origin(&self) -> TimeStamp {
        self.state.borrow().origin
    }
}

impl Scheduler for VirtualScheduler {
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        let deadline = state.now.saturating_add(delay);
        state.queue.insert((deadline, id), callback);
        state.deadlines.insert(id, deadline);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        if let Some(deadline) = state.deadlines.remove(&id) {
            state.queue.remove(&(deadline, id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_fire_in_deadline_order_with_clock_at_deadline() {
        let scheduler = VirtualScheduler::new(TimeStamp(1_000));
        let log = Rc::new(RefCell::new(Vec::new()));

        for (label, delay) in [("late", 30), ("early", 10), ("mid", 20)] {
            let log = Rc::clone(&log);
            let clock = scheduler.clone();
            scheduler.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push((label, clock.now().relative))),
            );
        }

        scheduler.advance(Duration::from_millis(100));
        let log = log.borrow();
        assert_eq!(
            *log,
            vec![
                ("early", RelativeTime::from_millis(10)),
                ("mid", RelativeTime::from_millis(20)),
                ("late", RelativeTime::from_millis(30)),
            ]
        );
        assert_eq!(scheduler.now().relative, RelativeTime::from_millis(100));
        assert_eq!(scheduler.now().time_stamp, TimeStamp(1_100));
    }

    #[test]
    fn test_callbacks_may_schedule_and_clear() {
        let scheduler = VirtualScheduler::new(TimeStamp(0));
        let fired = Rc::new(RefCell::new(Vec::new()));

        let victim = {
            let fired = Rc::clone(&fired);
            scheduler.set_timeout(Duration::from_millis(50), Box::new(move || fired.borrow_mut().push("victim")))
        };
        {
            let inner = scheduler.clone();
            let fired = Rc::clone(&fired);
            scheduler.set_timeout(
                Duration::from_millis(10),
                Box::new(move || {
                    inner.clear_timeout(victim);
                    let fired = Rc::clone(&fired);
                    inner.set_timeout(Duration::from_millis(5), Box::new(move || fired.borrow_mut().push("chained")));
                }),
            );
        }

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*fired.borrow(), vec!["chained"]);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_advance_to_past_is_noop() {
        let scheduler = VirtualScheduler::new(TimeStamp(0));
        scheduler.advance(Duration::from_millis(40));
        scheduler.advance_to(RelativeTime::from_millis(10));
        assert_eq!(scheduler.now().relative, RelativeTime::from_millis(40));
    }
}
