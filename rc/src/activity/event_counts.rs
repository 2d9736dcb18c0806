//! Event-count accumulator

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::collection::RumEventType;
use crate::lifecycle::{LifeCycle, LifeCycleEvent, LifeCycleEventKind, Subscription};
use crate::time::RelativeTime;

/// Number of collected events per type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub error_count: u64,
    pub long_task_count: u64,
    pub resource_count: u64,
    pub user_action_count: u64,
}

impl EventCounts {
    fn record(&mut self, event_type: RumEventType) {
        match event_type {
            RumEventType::Error => self.error_count += 1,
            RumEventType::LongTask => self.long_task_count += 1,
            RumEventType::Resource => self.resource_count += 1,
            RumEventType::Action => self.user_action_count += 1,
            RumEventType::View => {}
        }
    }
}

/// Open accumulator; counts freeze once stopped
pub struct EventCountsSubscription {
    seen: Rc<RefCell<Vec<(RelativeTime, RumEventType)>>>,
    subscription: Subscription,
}

impl EventCountsSubscription {
    pub fn event_counts(&self) -> EventCounts {
        self.count_where(|_| true)
    }

    /// Counts of the events that started at or before `end`
    pub fn event_counts_until(&self, end: RelativeTime) -> EventCounts {
        self.count_where(|start_time| start_time <= end)
    }

    fn count_where(&self, keep: impl Fn(RelativeTime) -> bool) -> EventCounts {
        let mut counts = EventCounts::default();
        for (start_time, event_type) in self.seen.borrow().iter() {
            if keep(*start_time) {
                counts.record(*event_type);
            }
        }
        counts
    }

    pub fn stop(&self) {
        self.subscription.unsubscribe();
    }
}

/// Count every `RawEventCollected` from now until `stop`
pub fn track_event_counts(lifecycle: &LifeCycle) -> EventCountsSubscription {
    debug!("track_event_counts: called");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let subscription = lifecycle.subscribe(LifeCycleEventKind::RawEventCollected, move |event| {
        if let LifeCycleEvent::RawEventCollected(collected) = event {
            sink.borrow_mut().push((collected.start_time, collected.raw_rum_event.event_type()));
        }
    });
    EventCountsSubscription { seen, subscription }
}
