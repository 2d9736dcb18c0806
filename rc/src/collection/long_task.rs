//! Long task builder

use std::rc::Rc;

use tracing::debug;
use uuid::Uuid;

use super::raw::{LongTaskDetails, RawEventCollected, RawRumEvent, RawRumLongTaskEvent};
use crate::lifecycle::{EntryType, LifeCycle, LifeCycleEvent, LifeCycleEventKind, PerformanceEntry, Subscription};
use crate::time::{Clock, to_server_duration};

pub fn process_long_task(entry: &PerformanceEntry, clock: &dyn Clock) -> RawEventCollected {
    let start_clocks = clock.relative_to_clocks(entry.start_time);
    let event = RawRumLongTaskEvent {
        date: start_clocks.time_stamp,
        long_task: LongTaskDetails {
            id: Uuid::now_v7().to_string(),
            duration: to_server_duration(entry.duration),
        },
    };
    RawEventCollected::new(RawRumEvent::LongTask(event), start_clocks.relative)
}

pub fn start_long_task_collection(lifecycle: &LifeCycle, clock: Rc<dyn Clock>) -> Subscription {
    debug!("start_long_task_collection: called");
    let publisher = lifecycle.clone();
    lifecycle.subscribe(LifeCycleEventKind::PerformanceEntryCollected, move |event| {
        if let LifeCycleEvent::PerformanceEntryCollected(entry) = event {
            if entry.entry_type == EntryType::LongTask {
                publisher.notify(LifeCycleEvent::RawEventCollected(process_long_task(entry, clock.as_ref())));
            }
        }
    })
}
