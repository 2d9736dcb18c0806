//! Console error producer
//!
//! The host routes `console.error` through a [`Console`]. Tracking swaps its
//! error function for a wrapper that forwards to the original and then
//! publishes a [`RawError`] built from the arguments.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info};

use super::stacktrace::{StackTrace, format_error_message, to_stack_trace_string};
use super::{ErrorObservable, ErrorSource, RawError};
use crate::monitoring::{MonitoringSink, monitor};
use crate::time::{Clock, ClocksState};

/// One argument passed to `console.error`
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleArg {
    Text(String),
    /// An `Error` instance, already turned into a stack trace
    Error(StackTrace),
    /// Any other value
    Value(Value),
}

impl From<&str> for ConsoleArg {
    fn from(text: &str) -> Self {
        ConsoleArg::Text(text.to_string())
    }
}

pub type ConsoleFn = Rc<dyn Fn(&[ConsoleArg])>;

/// The host console, with a replaceable `error` function
pub struct Console {
    error: RefCell<ConsoleFn>,
}

impl Console {
    pub fn new(error: impl Fn(&[ConsoleArg]) + 'static) -> Self {
        Self {
            error: RefCell::new(Rc::new(error)),
        }
    }

    /// Call the current `error` function
    pub fn error(&self, args: &[ConsoleArg]) {
        let current = Rc::clone(&self.error.borrow());
        current(args);
    }

    /// Install `error`, returning the function it replaced
    pub fn replace_error(&self, error: ConsoleFn) -> ConsoleFn {
        self.error.replace(error)
    }

    pub fn current_error(&self) -> ConsoleFn {
        Rc::clone(&self.error.borrow())
    }
}

impl Default for Console {
    /// A console whose `error` writes to the log
    fn default() -> Self {
        Self::new(|args| info!(target: "rumcore::console", args = ?args, "console.error"))
    }
}

/// Guard over a wrapped console; restores the original on `stop` or drop
pub struct ConsoleTracking {
    console: Rc<Console>,
    original: RefCell<Option<ConsoleFn>>,
}

impl ConsoleTracking {
    pub fn stop(&self) {
        if let Some(original) = self.original.borrow_mut().take() {
            debug!("ConsoleTracking::stop: restoring original console.error");
            self.console.replace_error(original);
        }
    }

    pub fn is_active(&self) -> bool {
        self.original.borrow().is_some()
    }
}

impl Drop for ConsoleTracking {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Wrap `console.error` so every call also feeds `observable`
pub fn start_console_tracking(
    console: Rc<Console>,
    observable: ErrorObservable,
    clock: Rc<dyn Clock>,
    sink: Rc<dyn MonitoringSink>,
) -> ConsoleTracking {
    debug!("start_console_tracking: called");
    let original = console.current_error();
    let forward = Rc::clone(&original);
    let wrapper: ConsoleFn = Rc::new(move |args: &[ConsoleArg]| {
        forward(args);
        let _ = monitor(sink.as_ref(), "console error tracking", || {
            observable.notify(&build_error_from_args(args, clock.now()));
        });
    });
    console.replace_error(wrapper);
    ConsoleTracking {
        console,
        original: RefCell::new(Some(original)),
    }
}

/// Build the console RawError for `args`
pub fn build_error_from_args(args: &[ConsoleArg], start_clocks: ClocksState) -> RawError {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push("console error:".to_string());
    parts.extend(args.iter().map(format_console_arg));

    let stack = args.iter().find_map(|arg| match arg {
        ConsoleArg::Error(trace) => Some(to_stack_trace_string(trace)),
        _ => None,
    });

    RawError {
        message: parts.join(" "),
        stack,
        error_type: None,
        source: ErrorSource::Console,
        start_clocks,
        resource: None,
    }
}

fn format_console_arg(arg: &ConsoleArg) -> String {
    match arg {
        ConsoleArg::Text(text) => text.clone(),
        ConsoleArg::Error(trace) => format_error_message(trace),
        ConsoleArg::Value(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unserializable>".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::MemoryMonitor;
    use crate::time::{RelativeTime, TimeStamp, VirtualScheduler};
    use serde_json::json;

    fn collect(observable: &ErrorObservable) -> Rc<RefCell<Vec<RawError>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        observable.subscribe(move |error: &RawError| sink.borrow_mut().push(error.clone()));
        seen
    }

    #[test]
    fn test_message_joins_formatted_arguments() {
        let args = vec![
            ConsoleArg::from("Hello"),
            ConsoleArg::Value(json!({"foo": "bar"})),
            ConsoleArg::Error(StackTrace::new("TypeError", "bad")),
        ];
        let error = build_error_from_args(&args, ClocksState::default());

        assert_eq!(
            error.message,
            "console error: Hello {\n  \"foo\": \"bar\"\n} TypeError: bad"
        );
        assert_eq!(error.stack.as_deref(), Some("TypeError: bad"));
        assert_eq!(error.source, ErrorSource::Console);
    }

    #[test]
    fn test_stack_comes_from_first_error_argument() {
        let args = vec![
            ConsoleArg::Error(StackTrace::new("Error", "first")),
            ConsoleArg::Error(StackTrace::new("Error", "second")),
        ];
        let error = build_error_from_args(&args, ClocksState::default());
        assert_eq!(error.stack.as_deref(), Some("Error: first"));

        let error = build_error_from_args(&[ConsoleArg::from("plain")], ClocksState::default());
        assert_eq!(error.stack, None);
        assert_eq!(error.message, "console error: plain");
    }

    #[test]
    fn test_wrapper_calls_original_then_publishes() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let console = {
            let calls = Rc::clone(&calls);
            Rc::new(Console::new(move |args| calls.borrow_mut().push(args.len())))
        };
        let observable = ErrorObservable::new();
        let seen = collect(&observable);
        let clock = VirtualScheduler::new(TimeStamp(5_000));
        clock.advance(std::time::Duration::from_millis(20));

        let tracking = start_console_tracking(
            Rc::clone(&console),
            observable.clone(),
            Rc::new(clock.clone()),
            Rc::new(MemoryMonitor::new()),
        );
        console.error(&[ConsoleArg::from("oops"), ConsoleArg::from("again")]);

        assert_eq!(*calls.borrow(), vec![2]);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message, "console error: oops again");
        assert_eq!(seen[0].start_clocks.relative, RelativeTime::from_millis(20));
        assert!(tracking.is_active());
    }

    #[test]
    fn test_stop_and_drop_restore_original() {
        let console = Rc::new(Console::new(|_| {}));
        let observable = ErrorObservable::new();
        let seen = collect(&observable);
        let clock: Rc<dyn Clock> = Rc::new(VirtualScheduler::new(TimeStamp(0)));
        let sink: Rc<dyn MonitoringSink> = Rc::new(MemoryMonitor::new());

        let tracking = start_console_tracking(Rc::clone(&console), observable.clone(), Rc::clone(&clock), Rc::clone(&sink));
        tracking.stop();
        tracking.stop();
        console.error(&[ConsoleArg::from("after stop")]);
        assert!(seen.borrow().is_empty());

        {
            let _tracking = start_console_tracking(Rc::clone(&console), observable.clone(), clock, sink);
            console.error(&[ConsoleArg::from("tracked")]);
        }
        console.error(&[ConsoleArg::from("after drop")]);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_failing_observer_does_not_reach_caller() {
        let console = Rc::new(Console::new(|_| {}));
        let observable = ErrorObservable::new();
        observable.subscribe(|_: &RawError| panic!("observer failed"));
        let sink = Rc::new(MemoryMonitor::new());
        let _tracking = start_console_tracking(
            Rc::clone(&console),
            observable,
            Rc::new(VirtualScheduler::new(TimeStamp(0))),
            sink.clone(),
        );

        console.error(&[ConsoleArg::from("boom")]);
        assert_eq!(sink.reports().len(), 1);
        assert!(sink.reports()[0].contains("observer failed"));
    }
}
