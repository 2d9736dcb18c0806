//! Narrow interfaces to the world outside the engine
//!
//! The request proxies, the stack-trace library, the configuration and the
//! session are owned by the host. The engine only sees them through these
//! traits. In-memory implementations are provided for tests and replay.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use crate::errors::StackTrace;
use crate::time::ClocksState;

/// Everything a request proxy knows about a finished request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestCompleteContext {
    pub method: String,
    pub url: String,
    /// HTTP status, 0 when the request never got a response
    pub status: u16,
    pub is_aborted: bool,
    /// `Response.type` for fetch (`basic`, `cors`, `opaque`, ...)
    pub response_type: Option<String>,
    /// Response body as text, when it was read
    pub response: Option<String>,
    pub start_clocks: ClocksState,
    pub duration: Duration,
}

pub type RequestCompleteHandler = Rc<dyn Fn(&RequestCompleteContext)>;

/// Instrumentation of one request API (XHR or fetch)
pub trait RequestProxy {
    /// Register a handler called on every request completion
    fn on_request_complete(&self, handler: RequestCompleteHandler);

    /// Drop every registered handler
    fn reset(&self);
}

/// In-memory request proxy; the host calls [`RequestProxyHub::complete`]
#[derive(Default)]
pub struct RequestProxyHub {
    handlers: RefCell<Vec<RequestCompleteHandler>>,
}

impl RequestProxyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a completion to every registered handler
    pub fn complete(&self, context: &RequestCompleteContext) {
        let handlers: Vec<RequestCompleteHandler> = self.handlers.borrow().iter().cloned().collect();
        debug!(url = %context.url, status = context.status, handlers = handlers.len(), "RequestProxyHub::complete: called");
        for handler in handlers {
            handler(context);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl RequestProxy for RequestProxyHub {
    fn on_request_complete(&self, handler: RequestCompleteHandler) {
        self.handlers.borrow_mut().push(handler);
    }

    fn reset(&self) {
        debug!("RequestProxyHub::reset: called");
        self.handlers.borrow_mut().clear();
    }
}

/// What was thrown alongside an uncaught exception
#[derive(Debug, Clone, PartialEq)]
pub enum Thrown {
    /// An `Error` instance
    Error,
    /// Any other value, as JSON
    Value(serde_json::Value),
}

/// One uncaught exception as reported by the stack-trace library
#[derive(Debug, Clone, PartialEq)]
pub struct UncaughtException {
    pub stack_trace: Option<StackTrace>,
    pub thrown: Thrown,
}

pub type UncaughtHandler = Rc<dyn Fn(&UncaughtException)>;

/// Global uncaught-exception reporting
pub trait StackTraceSource {
    fn subscribe(&self, handler: &UncaughtHandler);

    /// Remove a handler previously passed to `subscribe` (matched by identity)
    fn unsubscribe(&self, handler: &UncaughtHandler);
}

/// In-memory stack-trace source; the host calls [`StackTraceHub::report`]
#[derive(Default)]
pub struct StackTraceHub {
    handlers: RefCell<Vec<UncaughtHandler>>,
}

impl StackTraceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, exception: &UncaughtException) {
        let handlers: Vec<UncaughtHandler> = self.handlers.borrow().iter().cloned().collect();
        debug!(handlers = handlers.len(), "StackTraceHub::report: called");
        for handler in handlers {
            handler(exception);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl StackTraceSource for StackTraceHub {
    fn subscribe(&self, handler: &UncaughtHandler) {
        self.handlers.borrow_mut().push(Rc::clone(handler));
    }

    fn unsubscribe(&self, handler: &UncaughtHandler) {
        self.handlers.borrow_mut().retain(|existing| !Rc::ptr_eq(existing, handler));
    }
}

/// Remote configuration as seen by the error aggregator
pub trait Configuration {
    /// True for URLs of the collector itself, which must never be reported
    fn is_intake_url(&self, url: &str) -> bool;

    /// True when the named feature flag is enabled; unknown flags are off
    fn is_enabled(&self, feature: &str) -> bool;

    /// Maximum response body length kept in network error stacks, `None` for unlimited
    fn request_error_response_length_limit(&self) -> Option<usize>;
}

/// Sampling decision for the current session
pub trait Session {
    fn is_tracked(&self) -> bool;

    fn is_tracked_with_resource(&self) -> bool;
}

/// Fixed sampling decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticSession {
    pub tracked: bool,
    pub tracked_with_resource: bool,
}

impl Default for StaticSession {
    fn default() -> Self {
        Self {
            tracked: true,
            tracked_with_resource: true,
        }
    }
}

impl Session for StaticSession {
    fn is_tracked(&self) -> bool {
        self.tracked
    }

    fn is_tracked_with_resource(&self) -> bool {
        self.tracked && self.tracked_with_resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn context(status: u16) -> RequestCompleteContext {
        RequestCompleteContext {
            method: "GET".to_string(),
            url: "https://example.com/api".to_string(),
            status,
            is_aborted: false,
            response_type: None,
            response: None,
            start_clocks: ClocksState::default(),
            duration: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_request_proxy_hub_delivers_until_reset() {
        let hub = RequestProxyHub::new();
        let seen = Rc::new(Cell::new(0));
        {
            let seen = Rc::clone(&seen);
            hub.on_request_complete(Rc::new(move |ctx: &RequestCompleteContext| seen.set(seen.get() + ctx.status as u32)));
        }

        hub.complete(&context(200));
        hub.reset();
        hub.complete(&context(500));

        assert_eq!(seen.get(), 200);
        assert_eq!(hub.handler_count(), 0);
    }

    #[test]
    fn test_stack_trace_hub_unsubscribes_by_identity() {
        let hub = StackTraceHub::new();
        let hits = Rc::new(Cell::new(0));
        let first: UncaughtHandler = {
            let hits = Rc::clone(&hits);
            Rc::new(move |_: &UncaughtException| hits.set(hits.get() + 1))
        };
        let second: UncaughtHandler = {
            let hits = Rc::clone(&hits);
            Rc::new(move |_: &UncaughtException| hits.set(hits.get() + 10))
        };
        hub.subscribe(&first);
        hub.subscribe(&second);
        hub.unsubscribe(&first);

        hub.report(&UncaughtException {
            stack_trace: None,
            thrown: Thrown::Value(serde_json::json!("oops")),
        });
        assert_eq!(hits.get(), 10);
        assert_eq!(hub.handler_count(), 1);
    }

    #[test]
    fn test_untracked_session_never_tracks_resources() {
        let session = StaticSession {
            tracked: false,
            tracked_with_resource: true,
        };
        assert!(!session.is_tracked_with_resource());
        assert!(StaticSession::default().is_tracked_with_resource());
    }
}
