//! Uncaught exception producer

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::stacktrace::format_unknown_error;
use super::{ErrorObservable, ErrorSource, RawError};
use crate::collaborators::{StackTraceSource, UncaughtException, UncaughtHandler};
use crate::time::Clock;

const UNCAUGHT_PREFIX: &str = "Uncaught";

/// Registration on the stack-trace source; `stop` removes it
pub struct RuntimeErrorTracking {
    source: Rc<dyn StackTraceSource>,
    handler: RefCell<Option<UncaughtHandler>>,
}

impl RuntimeErrorTracking {
    pub fn stop(&self) {
        if let Some(handler) = self.handler.borrow_mut().take() {
            debug!("RuntimeErrorTracking::stop: unsubscribing");
            self.source.unsubscribe(&handler);
        }
    }
}

/// Publish every uncaught exception reported by `source` as a `source` RawError
pub fn start_runtime_error_tracking(
    source: Rc<dyn StackTraceSource>,
    observable: ErrorObservable,
    clock: Rc<dyn Clock>,
) -> RuntimeErrorTracking {
    debug!("start_runtime_error_tracking: called");
    let handler: UncaughtHandler = Rc::new(move |exception: &UncaughtException| {
        let formatted = format_unknown_error(exception.stack_trace.as_ref(), &exception.thrown, UNCAUGHT_PREFIX);
        observable.notify(&RawError {
            message: formatted.message,
            stack: Some(formatted.stack),
            error_type: formatted.error_type,
            source: ErrorSource::Source,
            start_clocks: clock.now(),
            resource: None,
        });
    });
    source.subscribe(&handler);
    RuntimeErrorTracking {
        source,
        handler: RefCell::new(Some(handler)),
    }
}
