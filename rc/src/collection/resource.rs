//! Resource builder
//!
//! Resources come from two places: completed XHR/fetch requests, and resource
//! entries of the performance timeline. Timeline entries for XHR/fetch are
//! skipped since the request itself is already reported.

use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use super::raw::{RawEventCollected, RawRumEvent, RawRumResourceEvent, ResourceDetails, ResourceTracing, ResourceType};
use crate::collaborators::{Configuration, Session};
use crate::lifecycle::{
    EntryType, LifeCycle, LifeCycleEvent, LifeCycleEventKind, PerformanceEntry, RequestCompleteEvent, RequestType,
    Subscription,
};
use crate::time::{Clock, to_server_duration};

/// Initiator type of the entry describing the page's own document
pub const INITIAL_DOCUMENT: &str = "initial_document";

static EXTENSION: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9]+)$").ok());

pub fn process_request(request: &RequestCompleteEvent) -> RawEventCollected {
    let resource_type = match request.request_type {
        RequestType::Xhr => ResourceType::Xhr,
        RequestType::Fetch => ResourceType::Fetch,
    };
    let dd = match (request.trace_id, request.span_id) {
        (Some(trace_id), Some(span_id)) => Some(ResourceTracing {
            trace_id: trace_id.to_decimal_string(),
            span_id: Some(span_id.to_decimal_string()),
        }),
        _ => None,
    };
    let event = RawRumResourceEvent {
        date: request.start_clocks.time_stamp,
        resource: ResourceDetails {
            duration: to_server_duration(request.duration),
            method: Some(request.method.clone()),
            status_code: Some(request.status),
            resource_type,
            url: request.url.clone(),
            size: None,
        },
        dd,
    };
    RawEventCollected::new(RawRumEvent::Resource(event), request.start_clocks.relative)
}

pub fn process_resource_entry(entry: &PerformanceEntry, clock: &dyn Clock) -> RawEventCollected {
    let start_clocks = clock.relative_to_clocks(entry.start_time);
    let event = RawRumResourceEvent {
        date: start_clocks.time_stamp,
        resource: ResourceDetails {
            duration: to_server_duration(entry.duration),
            method: None,
            status_code: None,
            resource_type: compute_resource_kind(entry),
            url: entry.name.clone(),
            size: entry.decoded_body_size,
        },
        dd: entry.trace_id.as_ref().map(|trace_id| ResourceTracing {
            trace_id: trace_id.clone(),
            span_id: None,
        }),
    };
    RawEventCollected::new(RawRumEvent::Resource(event), start_clocks.relative)
}

/// Classify an entry from its initiator type, then from its URL path extension
pub fn compute_resource_kind(entry: &PerformanceEntry) -> ResourceType {
    let initiator = entry.initiator_type.as_deref().unwrap_or_default();
    match initiator {
        INITIAL_DOCUMENT => return ResourceType::Document,
        "xmlhttprequest" => return ResourceType::Xhr,
        "fetch" => return ResourceType::Fetch,
        "beacon" => return ResourceType::Beacon,
        _ => {}
    }

    let Ok(url) = Url::parse(&entry.name) else {
        debug!(url = %entry.name, "compute_resource_kind: unparsable url");
        return ResourceType::Other;
    };
    let extension = EXTENSION
        .as_ref()
        .and_then(|pattern| pattern.captures(url.path()))
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "css" => ResourceType::Css,
        "js" => ResourceType::Js,
        _ if matches!(initiator, "image" | "img" | "icon") => ResourceType::Image,
        "gif" | "jpg" | "jpeg" | "tiff" | "png" | "svg" | "ico" => ResourceType::Image,
        "woff" | "eot" | "woff2" | "ttf" => ResourceType::Font,
        _ if matches!(initiator, "audio" | "video") => ResourceType::Media,
        "mp3" | "mp4" => ResourceType::Media,
        _ => ResourceType::Other,
    }
}

/// Requests to the collector and inline `data:` URLs are never resources
pub fn is_allowed_request_url(configuration: &dyn Configuration, url: &str) -> bool {
    !configuration.is_intake_url(url) && !url.starts_with("data:")
}

fn is_request_kind(kind: ResourceType) -> bool {
    matches!(kind, ResourceType::Xhr | ResourceType::Fetch)
}

/// Subscribe to resource entries and request completions
pub fn start_resource_collection(
    lifecycle: &LifeCycle,
    session: Rc<dyn Session>,
    configuration: Rc<dyn Configuration>,
    clock: Rc<dyn Clock>,
) -> Vec<Subscription> {
    debug!("start_resource_collection: called");
    let entries = {
        let publisher = lifecycle.clone();
        let session = Rc::clone(&session);
        let configuration = Rc::clone(&configuration);
        lifecycle.subscribe(LifeCycleEventKind::PerformanceEntryCollected, move |event| {
            let LifeCycleEvent::PerformanceEntryCollected(entry) = event else {
                return;
            };
            if entry.entry_type != EntryType::Resource
                || !session.is_tracked_with_resource()
                || !is_allowed_request_url(configuration.as_ref(), &entry.name)
                || is_request_kind(compute_resource_kind(entry))
            {
                return;
            }
            publisher.notify(LifeCycleEvent::RawEventCollected(process_resource_entry(entry, clock.as_ref())));
        })
    };
    let requests = {
        let publisher = lifecycle.clone();
        lifecycle.subscribe(LifeCycleEventKind::RequestCompleted, move |event| {
            let LifeCycleEvent::RequestCompleted(request) = event else {
                return;
            };
            if !session.is_tracked_with_resource() || !is_allowed_request_url(configuration.as_ref(), &request.url) {
                return;
            }
            publisher.notify(LifeCycleEvent::RawEventCollected(process_request(request)));
        })
    };
    vec![entries, requests]
}
