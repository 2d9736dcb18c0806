//! Stack-trace model and its text rendering

use serde_json::Value;

use crate::collaborators::Thrown;

/// One frame of a computed stack trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Function name, `None` or `"?"` when anonymous
    pub func: Option<String>,
    pub args: Vec<String>,
    pub url: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// A computed stack trace, as produced by the host's stack-trace library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace {
    /// Error type, e.g. `TypeError`
    pub name: Option<String>,
    pub message: Option<String>,
    pub stack: Vec<StackFrame>,
}

impl StackTrace {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: Some(message.into()),
            stack: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.stack.push(frame);
        self
    }
}

/// Message, stack and type extracted from an arbitrary thrown value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedError {
    pub message: String,
    pub stack: String,
    pub error_type: Option<String>,
}

pub const NO_STACK_MESSAGE: &str = "No stack, consider using an instance of Error";
pub const EMPTY_MESSAGE: &str = "Empty message";

/// `"<name>: <message>"`, with `Error` standing in for a missing name
pub fn format_error_message(trace: &StackTrace) -> String {
    let name = trace.name.as_deref().filter(|name| !name.is_empty()).unwrap_or("Error");
    format!("{}: {}", name, trace.message.as_deref().unwrap_or_default())
}

/// Error message followed by one `at <func>(<args>) @ <url>:<line>:<column>` line per frame
pub fn to_stack_trace_string(trace: &StackTrace) -> String {
    let mut result = format_error_message(trace);
    for frame in &trace.stack {
        let func = match frame.func.as_deref() {
            None | Some("?") => "<anonymous>",
            Some(func) => func,
        };
        let args = if frame.args.is_empty() {
            String::new()
        } else {
            format!("({})", frame.args.join(", "))
        };
        let line = frame.line.filter(|line| *line > 0);
        let location = match (line, frame.column.filter(|column| *column > 0)) {
            (Some(line), Some(column)) => format!(":{}:{}", line, column),
            (Some(line), None) => format!(":{}", line),
            (None, _) => String::new(),
        };
        result.push_str(&format!(
            "\n  at {}{} @ {}{}",
            func,
            args,
            frame.url.as_deref().unwrap_or_default(),
            location
        ));
    }
    result
}

/// Turn whatever was thrown into a reportable error
///
/// Values that are not errors (and errors with no computed trace) are
/// rendered as `"<prefix> <json>"` with a fixed explanatory stack.
pub fn format_unknown_error(trace: Option<&StackTrace>, thrown: &Thrown, non_error_prefix: &str) -> FormattedError {
    let is_error = matches!(thrown, Thrown::Error);
    match trace {
        Some(trace) if trace.message.is_some() || is_error => FormattedError {
            message: trace
                .message
                .clone()
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| EMPTY_MESSAGE.to_string()),
            stack: to_stack_trace_string(trace),
            error_type: trace.name.clone(),
        },
        _ => {
            let json = match thrown {
                Thrown::Value(value) => json_stringify(value),
                Thrown::Error => "{}".to_string(),
            };
            FormattedError {
                message: format!("{} {}", non_error_prefix, json),
                stack: NO_STACK_MESSAGE.to_string(),
                error_type: trace.and_then(|trace| trace.name.clone()),
            }
        }
    }
}

fn json_stringify(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string())
}
