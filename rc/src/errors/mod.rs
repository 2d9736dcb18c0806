//! Raw error aggregation
//!
//! Three producers feed one [`ErrorObservable`]:
//! - [`console`] - `console.error` calls
//! - [`runtime`] - uncaught exceptions reported by the stack-trace library
//! - [`network`] - failed XHR/fetch requests

pub mod console;
pub mod network;
pub mod runtime;
mod stacktrace;

use std::cell::OnceCell;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info};

use crate::collaborators::{Configuration, RequestProxy, StackTraceSource};
use crate::lifecycle::Observable;
use crate::monitoring::MonitoringSink;
use crate::time::{Clock, ClocksState};

pub use console::{Console, ConsoleArg, ConsoleFn, ConsoleTracking};
pub use network::NetworkErrorTracking;
pub use runtime::RuntimeErrorTracking;
pub use stacktrace::{
    EMPTY_MESSAGE, FormattedError, NO_STACK_MESSAGE, StackFrame, StackTrace, format_error_message,
    format_unknown_error, to_stack_trace_string,
};

/// Where an error was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Console,
    Network,
    Source,
}

/// Request details attached to network errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResource {
    pub method: String,
    pub status_code: u16,
    pub url: String,
}

/// An error as produced by one of the aggregator's producers
#[derive(Debug, Clone, PartialEq)]
pub struct RawError {
    pub message: String,
    pub stack: Option<String>,
    pub error_type: Option<String>,
    pub source: ErrorSource,
    pub start_clocks: ClocksState,
    pub resource: Option<ErrorResource>,
}

pub type ErrorObservable = Observable<RawError>;

/// Host objects the aggregator hooks into
#[derive(Clone)]
pub struct ErrorCollaborators {
    pub configuration: Rc<dyn Configuration>,
    pub console: Rc<Console>,
    pub stack_traces: Rc<dyn StackTraceSource>,
    pub xhr: Rc<dyn RequestProxy>,
    pub fetch: Rc<dyn RequestProxy>,
    pub clock: Rc<dyn Clock>,
    pub monitor: Rc<dyn MonitoringSink>,
}

struct Producers {
    observable: ErrorObservable,
    console: ConsoleTracking,
    runtime: RuntimeErrorTracking,
    network: NetworkErrorTracking,
}

/// Owner of the three producers and their shared stream
///
/// The stream is created on the first `start`; later calls hand back the same
/// stream without installing the producers twice.
pub struct AutomaticErrorCollection {
    collaborators: ErrorCollaborators,
    producers: OnceCell<Producers>,
}

impl AutomaticErrorCollection {
    pub fn new(collaborators: ErrorCollaborators) -> Self {
        Self {
            collaborators,
            producers: OnceCell::new(),
        }
    }

    pub fn start(&self) -> ErrorObservable {
        debug!(started = self.producers.get().is_some(), "AutomaticErrorCollection::start: called");
        self.producers
            .get_or_init(|| {
                info!("Starting automatic error collection");
                let c = &self.collaborators;
                let observable = ErrorObservable::with_monitor(Rc::clone(&c.monitor));
                let network = network::track_network_error(
                    Rc::clone(&c.configuration),
                    observable.clone(),
                    Rc::clone(&c.xhr),
                    Rc::clone(&c.fetch),
                );
                let console = console::start_console_tracking(
                    Rc::clone(&c.console),
                    observable.clone(),
                    Rc::clone(&c.clock),
                    Rc::clone(&c.monitor),
                );
                let runtime = runtime::start_runtime_error_tracking(
                    Rc::clone(&c.stack_traces),
                    observable.clone(),
                    Rc::clone(&c.clock),
                );
                Producers {
                    observable,
                    console,
                    runtime,
                    network,
                }
            })
            .observable
            .clone()
    }

    /// Detach every producer: the console is restored, the runtime handler
    /// unsubscribed and both proxies reset. Safe to call repeatedly.
    pub fn stop(&self) {
        debug!("AutomaticErrorCollection::stop: called");
        if let Some(producers) = self.producers.get() {
            producers.console.stop();
            producers.runtime.stop();
            producers.network.stop();
        }
    }

    pub fn is_started(&self) -> bool {
        self.producers.get().is_some()
    }
}
