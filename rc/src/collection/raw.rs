//! Outbound raw event schema
//!
//! Field names here are the collector's wire contract and must not change.
//! Optional fields are left out of the JSON entirely when absent.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::action::{ActionType, Context};
use crate::errors::{ErrorResource, ErrorSource};
use crate::lifecycle::ViewLoadingType;
use crate::time::{RelativeTime, ServerDuration, TimeStamp};

/// Discriminant of [`RawRumEvent`], as it appears in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RumEventType {
    Action,
    Error,
    LongTask,
    Resource,
    View,
}

/// One canonical event, ready for assembly
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawRumEvent {
    Action(RawRumActionEvent),
    Error(RawRumErrorEvent),
    LongTask(RawRumLongTaskEvent),
    Resource(RawRumResourceEvent),
    View(RawRumViewEvent),
}

impl RawRumEvent {
    pub fn event_type(&self) -> RumEventType {
        match self {
            RawRumEvent::Action(_) => RumEventType::Action,
            RawRumEvent::Error(_) => RumEventType::Error,
            RawRumEvent::LongTask(_) => RumEventType::LongTask,
            RawRumEvent::Resource(_) => RumEventType::Resource,
            RawRumEvent::View(_) => RumEventType::View,
        }
    }

    pub fn date(&self) -> TimeStamp {
        match self {
            RawRumEvent::Action(event) => event.date,
            RawRumEvent::Error(event) => event.date,
            RawRumEvent::LongTask(event) => event.date,
            RawRumEvent::Resource(event) => event.date,
            RawRumEvent::View(event) => event.date,
        }
    }
}

/// Payload of the `RawEventCollected` lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawEventCollected {
    pub raw_rum_event: RawRumEvent,
    /// Monotonic start of the event, used to attach it to the right view
    pub start_time: RelativeTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_context: Option<Context>,
}

impl RawEventCollected {
    pub fn new(raw_rum_event: RawRumEvent, start_time: RelativeTime) -> Self {
        Self {
            raw_rum_event,
            start_time,
            customer_context: None,
        }
    }
}

/// `{ "count": n }`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Count {
    pub count: u64,
}

impl From<u64> for Count {
    fn from(count: u64) -> Self {
        Self { count }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRumViewEvent {
    pub date: TimeStamp,
    pub view: ViewDetails,
    pub session: ViewSession,
    #[serde(rename = "_dd")]
    pub dd: ViewInternal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewDetails {
    pub action: Count,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cumulative_layout_shift: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_complete: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_content_loaded: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_interactive: Option<ServerDuration>,
    pub error: Count,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_contentful_paint: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_input_delay: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_input_time: Option<ServerDuration>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_contentful_paint: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_event: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_time: Option<ServerDuration>,
    pub loading_type: ViewLoadingType,
    pub long_task: Count,
    pub resource: Count,
    pub time_spent: ServerDuration,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_timings: BTreeMap<String, ServerDuration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewSession {
    /// Only ever `Some(true)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_replay: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewInternal {
    pub document_version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRumActionEvent {
    pub date: TimeStamp,
    pub action: ActionDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDetails {
    pub target: ActionTarget,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_time: Option<ServerDuration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_task: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Count>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionTarget {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRumResourceEvent {
    pub date: TimeStamp,
    pub resource: ResourceDetails,
    #[serde(rename = "_dd", skip_serializing_if = "Option::is_none")]
    pub dd: Option<ResourceTracing>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDetails {
    pub duration: ServerDuration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Trace correlation; ids are decimal strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTracing {
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Document,
    Xhr,
    Beacon,
    Fetch,
    Css,
    Js,
    Image,
    Font,
    Media,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRumErrorEvent {
    pub date: TimeStamp,
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ErrorResource>,
    pub source: ErrorSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRumLongTaskEvent {
    pub date: TimeStamp,
    pub long_task: LongTaskDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongTaskDetails {
    pub id: String,
    pub duration: ServerDuration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_tag_is_flattened_into_event() {
        let event = RawRumEvent::LongTask(RawRumLongTaskEvent {
            date: TimeStamp(1_000),
            long_task: LongTaskDetails {
                id: "abc".to_string(),
                duration: ServerDuration(50_000_000),
            },
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "long_task",
                "date": 1000,
                "long_task": { "id": "abc", "duration": 50_000_000u64 },
            })
        );
        assert_eq!(event.event_type(), RumEventType::LongTask);
        assert_eq!(event.date(), TimeStamp(1_000));
    }

    #[test]
    fn test_collected_omits_missing_context() {
        let collected = RawEventCollected::new(
            RawRumEvent::Error(RawRumErrorEvent {
                date: TimeStamp(5),
                error: ErrorDetails {
                    message: "boom".to_string(),
                    resource: None,
                    source: ErrorSource::Source,
                    stack: None,
                    error_type: None,
                },
            }),
            RelativeTime::from_millis(5),
        );
        let value = serde_json::to_value(&collected).unwrap();
        assert_eq!(value["start_time"], json!(5.0));
        assert!(value.get("customer_context").is_none());
        assert_eq!(
            value["raw_rum_event"],
            json!({ "type": "error", "date": 5, "error": { "message": "boom", "source": "source" } })
        );
    }
}
