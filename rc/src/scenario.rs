//! Scripted replay of browser signals
//!
//! A scenario is a YAML list of timed steps. [`Replay`] hosts a [`RumContext`]
//! on virtual time with in-memory collaborators; [`run_scenario`] drives it
//! through every step and writes each collected event as one JSON line.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use eyre::{Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::action::{Context, Element};
use crate::collaborators::{
    RequestCompleteContext, RequestProxyHub, StackTraceHub, StaticSession, Thrown, UncaughtException,
};
use crate::collection::{RawEventCollected, RawRumEvent};
use crate::config::Config;
use crate::error::ScenarioError;
use crate::errors::{Console, ConsoleArg, StackFrame, StackTrace};
use crate::lifecycle::{
    EntryType, LifeCycleEvent, LifeCycleEventKind, PerformanceEntry, RequestCompleteEvent, RequestStartEvent,
    RequestType, Subscription, TraceIdentifier, ViewCreatedEvent, ViewEvent, ViewEventCounts, ViewLoadingType,
    ViewTimings,
};
use crate::monitoring::TracingMonitor;
use crate::rum::{Collaborators, RumContext};
use crate::time::{Clock, RelativeTime, TimeStamp, VirtualScheduler, duration_from_millis, elapsed};

/// A replay script
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Scenario {
    /// Wall-clock epoch milliseconds of the page time origin
    pub origin_ms: i64,
    /// Time allowed after the last step for pending windows to settle
    pub settle_ms: Option<u64>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Step {
    /// Offset from the time origin
    pub at_ms: u64,
    #[serde(flatten)]
    pub signal: Signal,
}

/// One injected browser signal
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "signal", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum Signal {
    Click {
        target: Element,
    },
    CustomAction {
        name: String,
        #[serde(default)]
        context: Option<Context>,
    },
    DomMutated,
    RequestStarted {
        index: u64,
    },
    RequestCompleted(RequestSignal),
    PerformanceEntry(EntrySignal),
    ConsoleError {
        args: Vec<ConsoleArgSignal>,
    },
    Uncaught(UncaughtSignal),
    ViewCreated(ViewSignal),
    ViewUpdated(ViewSignal),
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RequestSignal {
    pub index: u64,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub status: u16,
    /// The request is taken to have started this long before the step
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub response_type: Option<String>,
    #[serde(default)]
    pub is_aborted: bool,
    #[serde(default)]
    pub trace_id: Option<u64>,
    #[serde(default)]
    pub span_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EntrySignal {
    pub entry_type: EntryType,
    #[serde(default)]
    pub name: String,
    /// Defaults to the step time
    #[serde(default)]
    pub start_ms: Option<f64>,
    #[serde(default)]
    pub duration_ms: f64,
    #[serde(default)]
    pub initiator_type: Option<String>,
    #[serde(default)]
    pub decoded_body_size: Option<u64>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Exactly one of the three fields must be set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsoleArgSignal {
    pub text: Option<String>,
    pub error: Option<ErrorSignal>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ErrorSignal {
    pub name: Option<String>,
    pub message: Option<String>,
    pub frames: Vec<FrameSignal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrameSignal {
    pub func: Option<String>,
    pub args: Vec<String>,
    pub url: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// An `Error` instance when `error` is set, otherwise the thrown `value`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UncaughtSignal {
    pub error: Option<ErrorSignal>,
    pub value: Option<Value>,
}

fn default_document_version() -> u64 {
    1
}

fn default_loading_type() -> ViewLoadingType {
    ViewLoadingType::InitialLoad
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ViewSignal {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: String,
    /// Start of the view, relative to the time origin
    #[serde(default)]
    pub start_ms: f64,
    #[serde(default = "default_document_version")]
    pub document_version: u64,
    #[serde(default)]
    pub loading_time_ms: Option<f64>,
    #[serde(default = "default_loading_type")]
    pub loading_type: ViewLoadingType,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub has_replay: bool,
    #[serde(default)]
    pub cumulative_layout_shift: Option<f64>,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub long_task_count: u64,
    #[serde(default)]
    pub resource_count: u64,
    #[serde(default)]
    pub user_action_count: u64,
    #[serde(default)]
    pub custom_timings: BTreeMap<String, f64>,
}

impl Scenario {
    /// Parse and validate a scenario
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioError> {
        debug!(len = content.len(), "Scenario::from_yaml: called");
        let scenario: Scenario = serde_yaml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!(?path, "Scenario::load: called");
        let content =
            fs::read_to_string(path).context(format!("Failed to read scenario file: {}", path.display()))?;
        let scenario =
            Self::from_yaml(&content).context(format!("Failed to load scenario file: {}", path.display()))?;
        info!(steps = scenario.steps.len(), "Loaded scenario from {}", path.display());
        Ok(scenario)
    }

    /// Steps must be in time order and carry well-formed payloads
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut previous_ms = 0;
        for (index, step) in self.steps.iter().enumerate() {
            if step.at_ms < previous_ms {
                return Err(ScenarioError::OutOfOrder {
                    index,
                    at_ms: step.at_ms,
                    previous_ms,
                });
            }
            previous_ms = step.at_ms;
            step.signal
                .validate()
                .map_err(|message| ScenarioError::InvalidStep { index, message })?;
        }
        Ok(())
    }
}

impl Signal {
    fn validate(&self) -> Result<(), String> {
        match self {
            Signal::ConsoleError { args } => {
                for (position, arg) in args.iter().enumerate() {
                    let set = [arg.text.is_some(), arg.error.is_some(), arg.value.is_some()]
                        .iter()
                        .filter(|set| **set)
                        .count();
                    if set != 1 {
                        return Err(format!(
                            "console argument {} must set exactly one of text, error or value",
                            position
                        ));
                    }
                }
                Ok(())
            }
            Signal::Uncaught(uncaught) if uncaught.error.is_some() && uncaught.value.is_some() => {
                Err("uncaught must set either error or value, not both".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl ErrorSignal {
    fn to_stack_trace(&self) -> StackTrace {
        StackTrace {
            name: self.name.clone(),
            message: self.message.clone(),
            stack: self
                .frames
                .iter()
                .map(|frame| StackFrame {
                    func: frame.func.clone(),
                    args: frame.args.clone(),
                    url: frame.url.clone(),
                    line: frame.line,
                    column: frame.column,
                })
                .collect(),
        }
    }
}

impl ConsoleArgSignal {
    fn to_console_arg(&self) -> ConsoleArg {
        if let Some(text) = &self.text {
            ConsoleArg::Text(text.clone())
        } else if let Some(error) = &self.error {
            ConsoleArg::Error(error.to_stack_trace())
        } else {
            ConsoleArg::Value(self.value.clone().unwrap_or(Value::Null))
        }
    }
}

/// A `RumContext` on virtual time, with the host side played by in-memory hubs
pub struct Replay {
    scheduler: VirtualScheduler,
    console: Rc<Console>,
    stack_traces: Rc<StackTraceHub>,
    xhr: Rc<RequestProxyHub>,
    fetch: Rc<RequestProxyHub>,
    collected: Rc<RefCell<Vec<RawEventCollected>>>,
    collector: Subscription,
    context: RumContext,
}

impl Replay {
    pub fn new(config: &Config, origin: TimeStamp) -> Self {
        debug!(origin = origin.0, "Replay::new: called");
        let scheduler = VirtualScheduler::new(origin);
        let console = Rc::new(Console::default());
        let stack_traces = Rc::new(StackTraceHub::new());
        let xhr = Rc::new(RequestProxyHub::new());
        let fetch = Rc::new(RequestProxyHub::new());
        let session: StaticSession = config.static_session();

        let context = RumContext::start(
            config.page_activity(),
            Collaborators {
                configuration: Rc::new(config.clone()),
                session: Rc::new(session),
                console: Rc::clone(&console),
                stack_traces: stack_traces.clone(),
                xhr: xhr.clone(),
                fetch: fetch.clone(),
                clock: Rc::new(scheduler.clone()),
                scheduler: Rc::new(scheduler.clone()),
                monitor: Rc::new(TracingMonitor),
            },
        );

        let collected = Rc::new(RefCell::new(Vec::new()));
        let collector = {
            let collected = Rc::clone(&collected);
            context
                .lifecycle()
                .subscribe(LifeCycleEventKind::RawEventCollected, move |event| {
                    if let LifeCycleEvent::RawEventCollected(raw) = event {
                        collected.borrow_mut().push(raw.clone());
                    }
                })
        };

        Self {
            scheduler,
            console,
            stack_traces,
            xhr,
            fetch,
            collected,
            collector,
            context,
        }
    }

    pub fn context(&self) -> &RumContext {
        &self.context
    }

    /// Move virtual time forward, firing due timers
    pub fn advance_to(&self, at: RelativeTime) {
        self.scheduler.advance_to(at);
    }

    pub fn advance(&self, by: Duration) {
        self.scheduler.advance(by);
    }

    /// Take every event collected since the last drain
    pub fn drain(&self) -> Vec<RawEventCollected> {
        self.collected.take()
    }

    /// Deliver `signal` at the current virtual time
    pub fn inject(&self, signal: &Signal) {
        let now = self.scheduler.now();
        debug!(now_ms = now.relative.as_millis_f64(), "Replay::inject: called");
        let lifecycle = self.context.lifecycle();
        match signal {
            Signal::Click { target } => {
                self.context.on_click(target);
            }
            Signal::CustomAction { name, context } => {
                self.context.add_action(name.clone(), context.clone());
            }
            Signal::DomMutated => lifecycle.notify(LifeCycleEvent::DomMutated),
            Signal::RequestStarted { index } => {
                lifecycle.notify(LifeCycleEvent::RequestStarted(RequestStartEvent { request_index: *index }))
            }
            Signal::RequestCompleted(request) => {
                let duration = duration_from_millis(request.duration_ms);
                let start = RelativeTime::new(now.relative.as_duration().saturating_sub(duration));
                let start_clocks = self.scheduler.relative_to_clocks(start);
                lifecycle.notify(LifeCycleEvent::RequestCompleted(RequestCompleteEvent {
                    request_index: request.index,
                    request_type: request.request_type,
                    method: request.method.clone(),
                    url: request.url.clone(),
                    status: request.status,
                    start_clocks,
                    duration,
                    trace_id: request.trace_id.map(TraceIdentifier),
                    span_id: request.span_id.map(TraceIdentifier),
                }));
                let proxy = match request.request_type {
                    RequestType::Xhr => &self.xhr,
                    RequestType::Fetch => &self.fetch,
                };
                proxy.complete(&RequestCompleteContext {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    status: request.status,
                    is_aborted: request.is_aborted,
                    response_type: request.response_type.clone(),
                    response: request.response.clone(),
                    start_clocks,
                    duration,
                });
            }
            Signal::PerformanceEntry(entry) => {
                let start_time = entry
                    .start_ms
                    .map(RelativeTime::from_millis_f64)
                    .unwrap_or(now.relative);
                let mut performance_entry = PerformanceEntry::new(
                    entry.entry_type.clone(),
                    entry.name.clone(),
                    start_time,
                    duration_from_millis(entry.duration_ms),
                );
                performance_entry.initiator_type = entry.initiator_type.clone();
                performance_entry.decoded_body_size = entry.decoded_body_size;
                performance_entry.trace_id = entry.trace_id.clone();
                lifecycle.notify(LifeCycleEvent::PerformanceEntryCollected(performance_entry));
            }
            Signal::ConsoleError { args } => {
                let args: Vec<ConsoleArg> = args.iter().map(ConsoleArgSignal::to_console_arg).collect();
                self.console.error(&args);
            }
            Signal::Uncaught(uncaught) => {
                let exception = match &uncaught.error {
                    Some(error) => UncaughtException {
                        stack_trace: Some(error.to_stack_trace()),
                        thrown: Thrown::Error,
                    },
                    None => UncaughtException {
                        stack_trace: None,
                        thrown: Thrown::Value(uncaught.value.clone().unwrap_or(Value::Null)),
                    },
                };
                self.stack_traces.report(&exception);
            }
            Signal::ViewCreated(view) => {
                lifecycle.notify(LifeCycleEvent::ViewCreated(ViewCreatedEvent {
                    id: view.id.clone(),
                    name: view.name.clone(),
                    location: view.location.clone(),
                    start_clocks: self.scheduler.relative_to_clocks(RelativeTime::from_millis_f64(view.start_ms)),
                }));
            }
            Signal::ViewUpdated(view) => {
                let start = RelativeTime::from_millis_f64(view.start_ms);
                lifecycle.notify(LifeCycleEvent::ViewUpdated(ViewEvent {
                    id: view.id.clone(),
                    name: view.name.clone(),
                    location: view.location.clone(),
                    document_version: view.document_version,
                    start_clocks: self.scheduler.relative_to_clocks(start),
                    duration: elapsed(start, now.relative),
                    loading_time: view.loading_time_ms.map(duration_from_millis),
                    loading_type: view.loading_type,
                    is_active: view.is_active,
                    has_replay: view.has_replay,
                    cumulative_layout_shift: view.cumulative_layout_shift,
                    timings: ViewTimings::default(),
                    event_counts: ViewEventCounts {
                        error_count: view.error_count,
                        long_task_count: view.long_task_count,
                        resource_count: view.resource_count,
                        user_action_count: view.user_action_count,
                    },
                    custom_timings: view
                        .custom_timings
                        .iter()
                        .map(|(name, millis)| (name.clone(), duration_from_millis(*millis)))
                        .collect(),
                }));
            }
        }
    }
}

impl Drop for Replay {
    fn drop(&mut self) {
        self.collector.unsubscribe();
    }
}

/// One output line
#[derive(Debug, Serialize)]
struct ReplayLine<'a> {
    start_time_ms: f64,
    event: &'a RawRumEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_context: Option<&'a Context>,
}

fn write_collected(out: &mut dyn Write, collected: &[RawEventCollected]) -> Result<()> {
    for raw in collected {
        let line = ReplayLine {
            start_time_ms: raw.start_time.as_millis_f64(),
            event: &raw.raw_rum_event,
            customer_context: raw.customer_context.as_ref(),
        };
        let json = serde_json::to_string(&line).context("Failed to serialize collected event")?;
        writeln!(out, "{}", json).context("Failed to write collected event")?;
    }
    Ok(())
}

/// Play `scenario` and write every collected event to `out`
///
/// Returns the number of events written.
pub fn run_scenario(scenario: &Scenario, config: &Config, out: &mut dyn Write) -> Result<usize> {
    info!(steps = scenario.steps.len(), "Running scenario");
    let replay = Replay::new(config, TimeStamp(scenario.origin_ms));
    let mut written = 0;

    for step in &scenario.steps {
        replay.advance_to(RelativeTime::from_millis(step.at_ms));
        replay.inject(&step.signal);
        let collected = replay.drain();
        write_collected(out, &collected)?;
        written += collected.len();
    }

    let settle = scenario
        .settle_ms
        .map(Duration::from_millis)
        .unwrap_or(config.page_activity().max_duration);
    debug!(settle_ms = settle.as_millis() as u64, "run_scenario: settling");
    replay.advance(settle);
    let collected = replay.drain();
    write_collected(out, &collected)?;
    written += collected.len();

    info!(written, "Scenario complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(yaml: &str) -> Vec<Value> {
        let scenario = Scenario::from_yaml(yaml).unwrap();
        let mut out = Vec::new();
        run_scenario(&scenario, &Config::default(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_steps() {
        let scenario = Scenario::from_yaml(
            r#"
origin-ms: 1000
settle-ms: 500
steps:
  - at-ms: 10
    signal: click
    target:
      tag: button
      text: Save
  - at-ms: 20
    signal: dom-mutated
  - at-ms: 30
    signal: request-started
    index: 1
"#,
        )
        .unwrap();
        assert_eq!(scenario.origin_ms, 1000);
        assert_eq!(scenario.settle_ms, Some(500));
        assert_eq!(scenario.steps.len(), 3);
        assert!(matches!(&scenario.steps[0].signal, Signal::Click { target } if target.text == "Save"));
        assert!(matches!(scenario.steps[1].signal, Signal::DomMutated));
        assert!(matches!(scenario.steps[2].signal, Signal::RequestStarted { index: 1 }));
    }

    #[test]
    fn test_out_of_order_steps_rejected() {
        let err = Scenario::from_yaml(
            r#"
steps:
  - at-ms: 50
    signal: dom-mutated
  - at-ms: 40
    signal: dom-mutated
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::OutOfOrder {
                index: 1,
                at_ms: 40,
                previous_ms: 50
            }
        ));
    }

    #[test]
    fn test_ambiguous_console_arg_rejected() {
        let err = Scenario::from_yaml(
            r#"
steps:
  - at-ms: 0
    signal: console-error
    args:
      - text: hello
        value: 3
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ScenarioError::InvalidStep { index: 0, .. }));
    }

    #[test]
    fn test_unknown_signal_is_a_parse_error() {
        let err = Scenario::from_yaml("steps:\n  - at-ms: 0\n    signal: teleport\n").unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)));
    }

    #[test]
    fn test_click_replay_emits_action_with_measured_duration() {
        let lines = run(r#"
origin-ms: 1000
steps:
  - at-ms: 100
    signal: click
    target:
      tag: button
      text: Save
  - at-ms: 150
    signal: dom-mutated
  - at-ms: 200
    signal: dom-mutated
"#);
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["start_time_ms"], 100.0);
        assert_eq!(line["event"]["type"], "action");
        assert_eq!(line["event"]["date"], 1100);
        assert_eq!(line["event"]["action"]["target"]["name"], "Save");
        assert_eq!(line["event"]["action"]["type"], "click");
        assert_eq!(line["event"]["action"]["loading_time"], 100_000_000u64);
    }

    #[test]
    fn test_click_without_activity_emits_nothing() {
        let lines = run(r#"
steps:
  - at-ms: 100
    signal: click
    target:
      tag: button
      text: Save
"#);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_console_and_network_errors_are_collected() {
        let lines = run(r#"
steps:
  - at-ms: 5
    signal: console-error
    args:
      - text: boom
  - at-ms: 10
    signal: request-completed
    index: 1
    type: fetch
    method: POST
    url: https://api.example.com/items
    status: 503
    duration-ms: 4
    response: unavailable
"#);
        let errors: Vec<&Value> = lines.iter().filter(|line| line["event"]["type"] == "error").collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["event"]["error"]["source"], "console");
        assert_eq!(errors[0]["event"]["error"]["message"], "console error: boom");
        assert_eq!(errors[1]["event"]["error"]["source"], "network");
        assert_eq!(errors[1]["event"]["error"]["resource"]["status_code"], 503);
        assert_eq!(errors[1]["event"]["error"]["resource"]["method"], "POST");
        let resources: Vec<&Value> = lines.iter().filter(|line| line["event"]["type"] == "resource").collect();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["event"]["resource"]["type"], "fetch");
        assert_eq!(resources[0]["start_time_ms"], 6.0);
    }

    #[test]
    fn test_custom_action_carries_context() {
        let lines = run(r#"
steps:
  - at-ms: 7
    signal: custom-action
    name: checkout
    context:
      cart: 3
"#);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"]["action"]["type"], "custom");
        assert_eq!(lines[0]["customer_context"]["cart"], 3);
    }

    #[test]
    fn test_view_update_and_uncaught_value() {
        let lines = run(r#"
origin-ms: 5000
steps:
  - at-ms: 0
    signal: view-created
    id: home
    location: https://shop.example.com/
  - at-ms: 40
    signal: uncaught
    value:
      code: 7
  - at-ms: 300
    signal: view-updated
    id: home
    location: https://shop.example.com/
    document-version: 2
    error-count: 1
    custom-timings:
      hero: 120
"#);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"]["error"]["source"], "source");
        assert_eq!(lines[0]["event"]["error"]["message"], "Uncaught {\"code\":7}");

        let view = &lines[1]["event"];
        assert_eq!(view["type"], "view");
        assert_eq!(view["date"], 5000);
        assert_eq!(view["view"]["time_spent"], 300_000_000u64);
        assert_eq!(view["view"]["error"]["count"], 1);
        assert_eq!(view["view"]["loading_type"], "initial_load");
        assert_eq!(view["view"]["custom_timings"]["hero"], 120_000_000u64);
        assert_eq!(view["_dd"]["document_version"], 2);
    }
}
