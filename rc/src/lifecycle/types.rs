//! Event vocabulary carried by the lifecycle bus
//!
//! Producers (host shims, collaborators, the action coordinator, the builders)
//! publish these; consumers subscribe by [`LifeCycleEventKind`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::{AutoAction, AutoActionCreated, CustomAction};
use crate::collection::RawEventCollected;
use crate::time::{ClocksState, RelativeTime};

/// Everything that travels on the bus
#[derive(Debug, Clone)]
pub enum LifeCycleEvent {
    /// A raw entry from the performance timeline
    PerformanceEntryCollected(PerformanceEntry),
    /// A request left the page
    RequestStarted(RequestStartEvent),
    /// A request finished (any outcome)
    RequestCompleted(RequestCompleteEvent),
    /// The DOM changed
    DomMutated,
    /// A pending auto action was opened
    AutoActionCreated(AutoActionCreated),
    /// A pending auto action settled with activity
    AutoActionCompleted(AutoAction),
    /// A pending auto action was dropped
    AutoActionDiscarded,
    /// The host application declared an action
    CustomActionCollected(CustomAction),
    /// A new view started
    ViewCreated(ViewCreatedEvent),
    /// A view's accumulated state changed
    ViewUpdated(ViewEvent),
    /// A canonical event is ready for assembly and transport
    RawEventCollected(RawEventCollected),
}

/// Discriminant used to subscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifeCycleEventKind {
    PerformanceEntryCollected,
    RequestStarted,
    RequestCompleted,
    DomMutated,
    AutoActionCreated,
    AutoActionCompleted,
    AutoActionDiscarded,
    CustomActionCollected,
    ViewCreated,
    ViewUpdated,
    RawEventCollected,
}

impl LifeCycleEvent {
    pub fn kind(&self) -> LifeCycleEventKind {
        match self {
            LifeCycleEvent::PerformanceEntryCollected(_) => LifeCycleEventKind::PerformanceEntryCollected,
            LifeCycleEvent::RequestStarted(_) => LifeCycleEventKind::RequestStarted,
            LifeCycleEvent::RequestCompleted(_) => LifeCycleEventKind::RequestCompleted,
            LifeCycleEvent::DomMutated => LifeCycleEventKind::DomMutated,
            LifeCycleEvent::AutoActionCreated(_) => LifeCycleEventKind::AutoActionCreated,
            LifeCycleEvent::AutoActionCompleted(_) => LifeCycleEventKind::AutoActionCompleted,
            LifeCycleEvent::AutoActionDiscarded => LifeCycleEventKind::AutoActionDiscarded,
            LifeCycleEvent::CustomActionCollected(_) => LifeCycleEventKind::CustomActionCollected,
            LifeCycleEvent::ViewCreated(_) => LifeCycleEventKind::ViewCreated,
            LifeCycleEvent::ViewUpdated(_) => LifeCycleEventKind::ViewUpdated,
            LifeCycleEvent::RawEventCollected(_) => LifeCycleEventKind::RawEventCollected,
        }
    }
}

impl fmt::Display for LifeCycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Performance timeline entry type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    Resource,
    #[serde(rename = "longtask")]
    LongTask,
    Navigation,
    Paint,
    LargestContentfulPaint,
    FirstInput,
    LayoutShift,
    #[serde(other)]
    Other,
}

/// One entry from the performance timeline
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceEntry {
    pub entry_type: EntryType,
    /// URL for resources, free-form otherwise
    pub name: String,
    pub start_time: RelativeTime,
    pub duration: Duration,
    pub initiator_type: Option<String>,
    pub decoded_body_size: Option<u64>,
    /// Trace id injected into the initial document by the backend
    pub trace_id: Option<String>,
}

impl PerformanceEntry {
    pub fn new(entry_type: EntryType, name: impl Into<String>, start_time: RelativeTime, duration: Duration) -> Self {
        Self {
            entry_type,
            name: name.into(),
            start_time,
            duration,
            initiator_type: None,
            decoded_body_size: None,
            trace_id: None,
        }
    }
}

/// Transport used by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Xhr,
    Fetch,
}

impl RequestType {
    /// Label used in network error messages
    pub fn label(&self) -> &'static str {
        match self {
            RequestType::Xhr => "XHR",
            RequestType::Fetch => "Fetch",
        }
    }
}

/// 64-bit trace/span identifier, rendered in decimal on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceIdentifier(pub u64);

impl TraceIdentifier {
    pub fn to_decimal_string(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestStartEvent {
    pub request_index: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestCompleteEvent {
    pub request_index: u64,
    pub request_type: RequestType,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub start_clocks: ClocksState,
    pub duration: Duration,
    pub trace_id: Option<TraceIdentifier>,
    pub span_id: Option<TraceIdentifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewCreatedEvent {
    pub id: String,
    pub name: Option<String>,
    pub location: String,
    pub start_clocks: ClocksState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewLoadingType {
    InitialLoad,
    RouteChange,
}

/// Navigation and paint timings of a view, all relative to its start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewTimings {
    pub dom_complete: Option<Duration>,
    pub dom_content_loaded: Option<Duration>,
    pub dom_interactive: Option<Duration>,
    pub first_contentful_paint: Option<Duration>,
    pub first_input_delay: Option<Duration>,
    pub first_input_time: Option<Duration>,
    pub largest_contentful_paint: Option<Duration>,
    pub load_event: Option<Duration>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewEventCounts {
    pub error_count: u64,
    pub long_task_count: u64,
    pub resource_count: u64,
    pub user_action_count: u64,
}

/// Snapshot of a view published by the view tracker on every update
#[derive(Debug, Clone, PartialEq)]
pub struct ViewEvent {
    pub id: String,
    pub name: Option<String>,
    pub location: String,
    pub document_version: u64,
    pub start_clocks: ClocksState,
    pub duration: Duration,
    pub loading_time: Option<Duration>,
    pub loading_type: ViewLoadingType,
    pub is_active: bool,
    pub has_replay: bool,
    pub cumulative_layout_shift: Option<f64>,
    pub timings: ViewTimings,
    pub event_counts: ViewEventCounts,
    pub custom_timings: BTreeMap<String, Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(LifeCycleEvent::DomMutated.kind(), LifeCycleEventKind::DomMutated);
        assert_eq!(
            LifeCycleEvent::AutoActionDiscarded.kind(),
            LifeCycleEventKind::AutoActionDiscarded
        );
        assert_eq!(
            LifeCycleEvent::RequestStarted(RequestStartEvent { request_index: 3 }).kind(),
            LifeCycleEventKind::RequestStarted
        );
    }

    #[test]
    fn test_entry_type_wire_names() {
        let parsed: EntryType = serde_json::from_str("\"longtask\"").unwrap();
        assert_eq!(parsed, EntryType::LongTask);
        let parsed: EntryType = serde_json::from_str("\"largest-contentful-paint\"").unwrap();
        assert_eq!(parsed, EntryType::LargestContentfulPaint);
        let parsed: EntryType = serde_json::from_str("\"element\"").unwrap();
        assert_eq!(parsed, EntryType::Other);
    }

    #[test]
    fn test_trace_identifier_is_decimal() {
        assert_eq!(TraceIdentifier(1234).to_decimal_string(), "1234");
    }
}
