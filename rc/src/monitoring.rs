//! Internal monitoring
//!
//! Faults raised inside lifecycle handlers, error-stream observers and the
//! console wrapper are caught here, reported to a sink and swallowed. Nothing
//! the engine does may break the page it instruments.

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

/// Destination for internal fault reports
pub trait MonitoringSink {
    fn report(&self, message: &str);
}

/// Default sink: logs through `tracing` at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitor;

impl MonitoringSink for TracingMonitor {
    fn report(&self, message: &str) {
        error!(target: "rumcore::monitoring", %message, "internal fault");
    }
}

/// Sink that keeps reports in memory, for hosts that forward them later
#[derive(Debug, Default)]
pub struct MemoryMonitor {
    reports: RefCell<Vec<String>>,
}

impl MemoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.borrow().is_empty()
    }
}

impl MonitoringSink for MemoryMonitor {
    fn report(&self, message: &str) {
        debug!(%message, "MemoryMonitor::report: called");
        self.reports.borrow_mut().push(message.to_string());
    }
}

/// Run `f`, turning a panic into a report on `sink`
///
/// `context` is only formatted when `f` panicked. Returns `None` in that case.
pub fn monitor<R>(sink: &dyn MonitoringSink, context: impl Display, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            sink.report(&format!("{}: {}", context, panic_message(payload.as_ref())));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
