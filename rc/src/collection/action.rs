//! Action builder

use tracing::debug;

use super::raw::{ActionDetails, ActionTarget, Count, RawEventCollected, RawRumActionEvent, RawRumEvent};
use crate::action::Action;
use crate::lifecycle::{LifeCycle, LifeCycleEvent, LifeCycleEventKind, Subscription};
use crate::time::to_server_duration;

pub fn process_action(action: &Action) -> RawEventCollected {
    let mut details = ActionDetails {
        target: ActionTarget {
            name: action.name().to_string(),
        },
        action_type: action.action_type(),
        id: None,
        loading_time: None,
        error: None,
        long_task: None,
        resource: None,
    };
    let customer_context = match action {
        Action::Auto(auto) => {
            details.id = Some(auto.id.clone());
            details.loading_time = Some(to_server_duration(auto.duration));
            details.error = Some(Count::from(auto.counts.error_count));
            details.long_task = Some(Count::from(auto.counts.long_task_count));
            details.resource = Some(Count::from(auto.counts.resource_count));
            None
        }
        Action::Custom(custom) => custom.context.clone(),
    };

    let start_clocks = action.start_clocks();
    RawEventCollected {
        raw_rum_event: RawRumEvent::Action(RawRumActionEvent {
            date: start_clocks.time_stamp,
            action: details,
        }),
        start_time: start_clocks.relative,
        customer_context,
    }
}

/// Turn completed auto actions and custom actions into action events
pub fn start_action_collection(lifecycle: &LifeCycle) -> Vec<Subscription> {
    debug!("start_action_collection: called");
    [LifeCycleEventKind::AutoActionCompleted, LifeCycleEventKind::CustomActionCollected]
        .into_iter()
        .map(|kind| {
            let publisher = lifecycle.clone();
            lifecycle.subscribe(kind, move |event| {
                let action = match event {
                    LifeCycleEvent::AutoActionCompleted(auto) => Action::Auto(auto.clone()),
                    LifeCycleEvent::CustomActionCollected(custom) => Action::Custom(custom.clone()),
                    _ => return,
                };
                publisher.notify(LifeCycleEvent::RawEventCollected(process_action(&action)));
            })
        })
        .collect()
}
