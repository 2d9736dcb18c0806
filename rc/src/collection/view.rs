//! View builder

use tracing::debug;

use super::raw::{Count, RawEventCollected, RawRumEvent, RawRumViewEvent, ViewDetails, ViewInternal, ViewSession};
use crate::lifecycle::{LifeCycle, LifeCycleEvent, LifeCycleEventKind, Subscription, ViewEvent};
use crate::time::to_server_duration;

pub fn process_view_update(view: &ViewEvent) -> RawEventCollected {
    let timings = &view.timings;
    let counts = &view.event_counts;
    let event = RawRumViewEvent {
        date: view.start_clocks.time_stamp,
        view: ViewDetails {
            action: Count::from(counts.user_action_count),
            cumulative_layout_shift: view.cumulative_layout_shift,
            dom_complete: timings.dom_complete.map(to_server_duration),
            dom_content_loaded: timings.dom_content_loaded.map(to_server_duration),
            dom_interactive: timings.dom_interactive.map(to_server_duration),
            error: Count::from(counts.error_count),
            first_contentful_paint: timings.first_contentful_paint.map(to_server_duration),
            first_input_delay: timings.first_input_delay.map(to_server_duration),
            first_input_time: timings.first_input_time.map(to_server_duration),
            is_active: view.is_active,
            name: view.name.clone(),
            largest_contentful_paint: timings.largest_contentful_paint.map(to_server_duration),
            load_event: timings.load_event.map(to_server_duration),
            loading_time: view.loading_time.map(to_server_duration),
            loading_type: view.loading_type,
            long_task: Count::from(counts.long_task_count),
            resource: Count::from(counts.resource_count),
            time_spent: to_server_duration(view.duration),
            custom_timings: view
                .custom_timings
                .iter()
                .map(|(name, duration)| (name.clone(), to_server_duration(*duration)))
                .collect(),
        },
        session: ViewSession {
            has_replay: view.has_replay.then_some(true),
        },
        dd: ViewInternal {
            document_version: view.document_version,
        },
    };
    RawEventCollected::new(RawRumEvent::View(event), view.start_clocks.relative)
}

/// Turn every `ViewUpdated` into a view event
pub fn start_view_collection(lifecycle: &LifeCycle) -> Subscription {
    debug!("start_view_collection: called");
    let publisher = lifecycle.clone();
    lifecycle.subscribe(LifeCycleEventKind::ViewUpdated, move |event| {
        if let LifeCycleEvent::ViewUpdated(view) = event {
            publisher.notify(LifeCycleEvent::RawEventCollected(process_view_update(view)));
        }
    })
}
