//! Single pending auto action
//!
//! At most one auto action is pending at a time. It opens on `create`, waits
//! for the page to go idle and then completes (the page reacted) or is
//! discarded (nothing happened, or a new view started).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};
use uuid::Uuid;

use super::types::{ActionType, AutoAction, AutoActionCreated, Context, CustomAction};
use crate::activity::{
    EventCountsSubscription, IdlePageActivity, PageActivityConfig, PageActivityEnd, track_event_counts,
    wait_idle_page_activity,
};
use crate::lifecycle::{LifeCycle, LifeCycleEvent};
use crate::time::{Clock, ClocksState, RelativeTime, Scheduler, elapsed};

struct PendingAutoAction {
    id: String,
    action_type: ActionType,
    name: String,
    start_clocks: ClocksState,
    event_counts: EventCountsSubscription,
}

impl PendingAutoAction {
    fn complete(&self, lifecycle: &LifeCycle, end_time: RelativeTime) {
        let counts = self.event_counts.event_counts_until(end_time);
        self.event_counts.stop();
        let action = AutoAction {
            id: self.id.clone(),
            action_type: self.action_type,
            name: self.name.clone(),
            start_clocks: self.start_clocks,
            duration: elapsed(self.start_clocks.relative, end_time),
            counts: counts.into(),
        };
        info!(id = %action.id, name = %action.name, duration_ms = action.duration.as_millis() as u64, "Auto action completed");
        lifecycle.notify(LifeCycleEvent::AutoActionCompleted(action));
    }

    fn discard(&self, lifecycle: &LifeCycle) {
        debug!(id = %self.id, "PendingAutoAction::discard: called");
        self.event_counts.stop();
        lifecycle.notify(LifeCycleEvent::AutoActionDiscarded);
    }
}

struct CurrentAction {
    pending: Rc<PendingAutoAction>,
    idle: IdlePageActivity,
}

/// Owner of the pending-action slot
pub struct ActionManager {
    lifecycle: LifeCycle,
    clock: Rc<dyn Clock>,
    scheduler: Rc<dyn Scheduler>,
    activity: PageActivityConfig,
    current: Rc<RefCell<Option<CurrentAction>>>,
}

impl ActionManager {
    pub fn new(
        lifecycle: LifeCycle,
        clock: Rc<dyn Clock>,
        scheduler: Rc<dyn Scheduler>,
        activity: PageActivityConfig,
    ) -> Self {
        debug!(?activity, "ActionManager::new: called");
        Self {
            lifecycle,
            clock,
            scheduler,
            activity,
            current: Rc::new(RefCell::new(None)),
        }
    }

    /// Open a pending action, unless one is already pending
    ///
    /// Returns the id of the new action.
    pub fn create(&self, action_type: ActionType, name: impl Into<String>) -> Option<String> {
        let name = name.into();
        if self.current.borrow().is_some() {
            debug!(%name, "ActionManager::create: action already pending, ignoring");
            return None;
        }

        let start_clocks = self.clock.now();
        let pending = Rc::new(PendingAutoAction {
            id: Uuid::now_v7().to_string(),
            action_type,
            name,
            start_clocks,
            event_counts: track_event_counts(&self.lifecycle),
        });
        debug!(id = %pending.id, name = %pending.name, "ActionManager::create: opening action");

        let idle = {
            let slot = Rc::downgrade(&self.current);
            let lifecycle = self.lifecycle.clone();
            let settled = Rc::clone(&pending);
            wait_idle_page_activity(
                &self.lifecycle,
                Rc::clone(&self.clock),
                Rc::clone(&self.scheduler),
                self.activity,
                move |end: PageActivityEnd| {
                    let finished = slot.upgrade().and_then(|slot| slot.take());
                    if end.had_activity {
                        settled.complete(&lifecycle, end.end_time);
                    } else {
                        settled.discard(&lifecycle);
                    }
                    drop(finished);
                },
            )
        };

        let id = pending.id.clone();
        *self.current.borrow_mut() = Some(CurrentAction {
            pending,
            idle,
        });
        self.lifecycle.notify(LifeCycleEvent::AutoActionCreated(AutoActionCreated {
            id: id.clone(),
            start_clocks,
        }));
        Some(id)
    }

    /// Drop the pending action, if any, without waiting for it to settle
    pub fn discard_current(&self) {
        let current = self.current.take();
        if let Some(current) = current {
            debug!(id = %current.pending.id, "ActionManager::discard_current: discarding");
            current.idle.stop();
            current.pending.discard(&self.lifecycle);
        }
    }

    /// Publish an action declared by the host application
    pub fn add_custom(&self, name: impl Into<String>, context: Option<Context>) {
        let action = CustomAction {
            name: name.into(),
            start_clocks: self.clock.now(),
            context,
        };
        debug!(name = %action.name, "ActionManager::add_custom: called");
        self.lifecycle.notify(LifeCycleEvent::CustomActionCollected(action));
    }

    pub fn has_pending(&self) -> bool {
        self.current.borrow().is_some()
    }

    pub fn current_id(&self) -> Option<String> {
        self.current.borrow().as_ref().map(|current| current.pending.id.clone())
    }
}
