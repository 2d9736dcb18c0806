//! Event builders
//!
//! Each builder is a pure `process_*` function from a domain record to a
//! [`RawEventCollected`], plus a `start_*_collection` subscriber that feeds
//! it from the bus and republishes the result.

pub mod action;
pub mod error;
pub mod long_task;
mod raw;
pub mod resource;
pub mod view;

pub use action::{process_action, start_action_collection};
pub use error::{process_error, start_error_collection};
pub use long_task::{process_long_task, start_long_task_collection};
pub use raw::{
    ActionDetails, ActionTarget, Count, ErrorDetails, LongTaskDetails, RawEventCollected, RawRumActionEvent,
    RawRumErrorEvent, RawRumEvent, RawRumLongTaskEvent, RawRumResourceEvent, RawRumViewEvent, ResourceDetails,
    ResourceTracing, ResourceType, RumEventType, ViewDetails, ViewInternal, ViewSession,
};
pub use resource::{compute_resource_kind, process_request, process_resource_entry, start_resource_collection};
pub use view::{process_view_update, start_view_collection};

#[cfg(test)]
pub(crate) mod test_support {
    //! Ready-made `RawEventCollected` bus events

    use super::*;
    use crate::errors::ErrorSource;
    use crate::lifecycle::LifeCycleEvent;
    use crate::time::{RelativeTime, ServerDuration, TimeStamp};

    fn collected(raw_rum_event: RawRumEvent) -> LifeCycleEvent {
        LifeCycleEvent::RawEventCollected(RawEventCollected::new(raw_rum_event, RelativeTime::ZERO))
    }

    /// `event` with its start time moved to `start_time`
    pub fn started_at(event: LifeCycleEvent, start_time: RelativeTime) -> LifeCycleEvent {
        match event {
            LifeCycleEvent::RawEventCollected(mut collected) => {
                collected.start_time = start_time;
                LifeCycleEvent::RawEventCollected(collected)
            }
            other => other,
        }
    }

    pub fn error_event() -> LifeCycleEvent {
        collected(RawRumEvent::Error(RawRumErrorEvent {
            date: TimeStamp(0),
            error: ErrorDetails {
                message: "boom".to_string(),
                resource: None,
                source: ErrorSource::Console,
                stack: None,
                error_type: None,
            },
        }))
    }

    pub fn long_task_event() -> LifeCycleEvent {
        collected(RawRumEvent::LongTask(RawRumLongTaskEvent {
            date: TimeStamp(0),
            long_task: LongTaskDetails {
                id: "long-task".to_string(),
                duration: ServerDuration(60_000_000),
            },
        }))
    }

    pub fn resource_event() -> LifeCycleEvent {
        collected(RawRumEvent::Resource(RawRumResourceEvent {
            date: TimeStamp(0),
            resource: ResourceDetails {
                duration: ServerDuration(1_000_000),
                method: None,
                status_code: None,
                resource_type: ResourceType::Other,
                url: "https://example.com/asset".to_string(),
                size: None,
            },
            dd: None,
        }))
    }
}
