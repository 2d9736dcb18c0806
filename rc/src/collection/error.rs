//! Error builder

use tracing::debug;

use super::raw::{ErrorDetails, RawEventCollected, RawRumErrorEvent, RawRumEvent};
use crate::errors::{ErrorObservable, RawError};
use crate::lifecycle::{LifeCycle, LifeCycleEvent, ObservableSubscription};

pub fn process_error(error: &RawError) -> RawEventCollected {
    let event = RawRumErrorEvent {
        date: error.start_clocks.time_stamp,
        error: ErrorDetails {
            message: error.message.clone(),
            resource: error.resource.clone(),
            source: error.source,
            stack: error.stack.clone(),
            error_type: error.error_type.clone(),
        },
    };
    RawEventCollected::new(RawRumEvent::Error(event), error.start_clocks.relative)
}

/// Publish every raw error on the bus
pub fn start_error_collection(lifecycle: &LifeCycle, errors: &ErrorObservable) -> ObservableSubscription<RawError> {
    debug!("start_error_collection: called");
    let publisher = lifecycle.clone();
    errors.subscribe(move |error: &RawError| {
        publisher.notify(LifeCycleEvent::RawEventCollected(process_error(error)));
    })
}
