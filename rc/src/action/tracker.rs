//! Click tracking
//!
//! Turns clicks into auto actions and discards the pending action when a new
//! view starts.

use std::rc::Rc;

use tracing::debug;

use super::manager::ActionManager;
use super::name::{Element, get_action_name_from_element};
use super::types::{ActionType, Context};
use crate::activity::PageActivityConfig;
use crate::lifecycle::{LifeCycle, LifeCycleEventKind, Subscription};
use crate::time::{Clock, Scheduler};

pub struct ActionTracker {
    manager: Rc<ActionManager>,
    view_created: Subscription,
}

impl ActionTracker {
    /// Handle a click on `target`; returns the id of the action it opened
    pub fn on_click(&self, target: &Element) -> Option<String> {
        let Some(name) = get_action_name_from_element(target) else {
            debug!(tag = %target.tag, "ActionTracker::on_click: no action name, ignoring");
            return None;
        };
        self.manager.create(ActionType::Click, name)
    }

    pub fn add_action(&self, name: impl Into<String>, context: Option<Context>) {
        self.manager.add_custom(name, context);
    }

    pub fn manager(&self) -> &ActionManager {
        &self.manager
    }

    pub fn stop(&self) {
        debug!("ActionTracker::stop: called");
        self.manager.discard_current();
        self.view_created.unsubscribe();
    }
}

pub fn track_actions(
    lifecycle: &LifeCycle,
    clock: Rc<dyn Clock>,
    scheduler: Rc<dyn Scheduler>,
    activity: PageActivityConfig,
) -> ActionTracker {
    debug!("track_actions: called");
    let manager = Rc::new(ActionManager::new(lifecycle.clone(), clock, scheduler, activity));
    let weak = Rc::downgrade(&manager);
    let view_created = lifecycle.subscribe(LifeCycleEventKind::ViewCreated, move |_| {
        if let Some(manager) = weak.upgrade() {
            manager.discard_current();
        }
    });
    ActionTracker { manager, view_created }
}
