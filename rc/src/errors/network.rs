//! Network error producer
//!
//! Listens to request completions from both proxies and reports failed ones:
//! rejected requests (no status, not opaque) and server errors (5xx).

use std::rc::Rc;

use tracing::debug;

use super::{ErrorObservable, ErrorResource, ErrorSource, RawError};
use crate::collaborators::{Configuration, RequestCompleteContext, RequestProxy};
use crate::lifecycle::RequestType;

/// Feature flag that stops aborted requests from being reported
pub const REMOVE_NETWORK_ERRORS_FLAG: &str = "remove-network-errors";

/// Stack used when the failed request had no readable body
pub const FAILED_TO_LOAD: &str = "Failed to load";

/// Hook on both proxies; `stop` resets them
pub struct NetworkErrorTracking {
    xhr: Rc<dyn RequestProxy>,
    fetch: Rc<dyn RequestProxy>,
}

impl NetworkErrorTracking {
    pub fn stop(&self) {
        debug!("NetworkErrorTracking::stop: resetting request proxies");
        self.xhr.reset();
        self.fetch.reset();
    }
}

pub fn track_network_error(
    configuration: Rc<dyn Configuration>,
    observable: ErrorObservable,
    xhr: Rc<dyn RequestProxy>,
    fetch: Rc<dyn RequestProxy>,
) -> NetworkErrorTracking {
    debug!("track_network_error: called");
    for (proxy, request_type) in [(&xhr, RequestType::Xhr), (&fetch, RequestType::Fetch)] {
        let configuration = Rc::clone(&configuration);
        let observable = observable.clone();
        proxy.on_request_complete(Rc::new(move |request: &RequestCompleteContext| {
            if let Some(error) = network_error(configuration.as_ref(), request_type, request) {
                observable.notify(&error);
            }
        }));
    }
    NetworkErrorTracking { xhr, fetch }
}

/// The RawError to report for `request`, if any
pub fn network_error(
    configuration: &dyn Configuration,
    request_type: RequestType,
    request: &RequestCompleteContext,
) -> Option<RawError> {
    if configuration.is_intake_url(&request.url) {
        return None;
    }
    if configuration.is_enabled(REMOVE_NETWORK_ERRORS_FLAG) && request.is_aborted {
        debug!(url = %request.url, "network_error: ignoring aborted request");
        return None;
    }
    if !is_rejected(request) && !is_server_error(request) {
        return None;
    }

    let stack = truncate_response(
        request.response.as_deref(),
        configuration.request_error_response_length_limit(),
    )
    .filter(|body| !body.is_empty())
    .unwrap_or_else(|| FAILED_TO_LOAD.to_string());

    Some(RawError {
        message: format!("{} error {} {}", request_type.label(), request.method, request.url),
        stack: Some(stack),
        error_type: None,
        source: ErrorSource::Network,
        start_clocks: request.start_clocks,
        resource: Some(ErrorResource {
            method: request.method.clone(),
            status_code: request.status,
            url: request.url.clone(),
        }),
    })
}

/// No response at all, unless the browser deliberately hid it (opaque)
pub fn is_rejected(request: &RequestCompleteContext) -> bool {
    request.status == 0 && request.response_type.as_deref() != Some("opaque")
}

pub fn is_server_error(request: &RequestCompleteContext) -> bool {
    request.status >= 500
}

/// Cut `response` to `limit` characters, marking the cut with `...`
pub fn truncate_response(response: Option<&str>, limit: Option<usize>) -> Option<String> {
    let response = response?;
    match limit {
        Some(limit) if response.chars().count() > limit => {
            let kept: String = response.chars().take(limit).collect();
            Some(format!("{}...", kept))
        }
        _ => Some(response.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::RequestProxyHub;
    use crate::time::ClocksState;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::time::Duration;

    struct TestConfiguration {
        remove_network_errors: bool,
        limit: Option<usize>,
    }

    impl Configuration for TestConfiguration {
        fn is_intake_url(&self, url: &str) -> bool {
            url.starts_with("https://intake.example.com")
        }

        fn is_enabled(&self, feature: &str) -> bool {
            feature == REMOVE_NETWORK_ERRORS_FLAG && self.remove_network_errors
        }

        fn request_error_response_length_limit(&self) -> Option<usize> {
            self.limit
        }
    }

    fn configuration() -> TestConfiguration {
        TestConfiguration {
            remove_network_errors: false,
            limit: Some(32),
        }
    }

    fn request(status: u16) -> RequestCompleteContext {
        RequestCompleteContext {
            method: "GET".to_string(),
            url: "https://api.example.com/items".to_string(),
            status,
            is_aborted: false,
            response_type: None,
            response: Some("Server error".to_string()),
            start_clocks: ClocksState::default(),
            duration: Duration::from_millis(40),
        }
    }

    #[test]
    fn test_server_error_is_reported() {
        let error = network_error(&configuration(), RequestType::Fetch, &request(503)).expect("reported");
        assert_eq!(error.message, "Fetch error GET https://api.example.com/items");
        assert_eq!(error.stack.as_deref(), Some("Server error"));
        assert_eq!(error.source, ErrorSource::Network);
        assert_eq!(
            error.resource,
            Some(ErrorResource {
                method: "GET".to_string(),
                status_code: 503,
                url: "https://api.example.com/items".to_string(),
            })
        );
    }

    #[test]
    fn test_classification() {
        let config = configuration();
        assert!(network_error(&config, RequestType::Xhr, &request(200)).is_none());
        assert!(network_error(&config, RequestType::Xhr, &request(404)).is_none());
        assert!(network_error(&config, RequestType::Xhr, &request(500)).is_some());
        assert!(network_error(&config, RequestType::Xhr, &request(0)).is_some());

        let mut opaque = request(0);
        opaque.response_type = Some("opaque".to_string());
        assert!(network_error(&config, RequestType::Fetch, &opaque).is_none());

        let mut intake = request(500);
        intake.url = "https://intake.example.com/v1/input".to_string();
        assert!(network_error(&config, RequestType::Fetch, &intake).is_none());
    }

    #[test]
    fn test_server_error_is_reported_whatever_the_response_type() {
        let config = configuration();
        for response_type in ["opaque", "cors", "basic"] {
            let mut failed = request(503);
            failed.response_type = Some(response_type.to_string());
            let error = network_error(&config, RequestType::Fetch, &failed).expect("reported");
            assert_eq!(error.resource.map(|resource| resource.status_code), Some(503));
        }

        let mut hidden = request(0);
        hidden.response_type = Some("opaque".to_string());
        assert!(network_error(&config, RequestType::Fetch, &hidden).is_none());
    }

    #[test]
    fn test_aborted_requests_follow_the_flag() {
        let mut aborted = request(0);
        aborted.is_aborted = true;

        assert!(network_error(&configuration(), RequestType::Xhr, &aborted).is_some());
        let flagged = TestConfiguration {
            remove_network_errors: true,
            limit: None,
        };
        assert!(network_error(&flagged, RequestType::Xhr, &aborted).is_none());
    }

    #[test]
    fn test_missing_or_empty_body_fails_to_load() {
        let mut no_body = request(500);
        no_body.response = None;
        let error = network_error(&configuration(), RequestType::Xhr, &no_body).expect("reported");
        assert_eq!(error.stack.as_deref(), Some(FAILED_TO_LOAD));
        assert_eq!(error.message, "XHR error GET https://api.example.com/items");

        no_body.response = Some(String::new());
        let error = network_error(&configuration(), RequestType::Xhr, &no_body).expect("reported");
        assert_eq!(error.stack.as_deref(), Some(FAILED_TO_LOAD));
    }

    #[test]
    fn test_truncate_response() {
        assert_eq!(truncate_response(Some("abcdef"), Some(3)).as_deref(), Some("abc..."));
        assert_eq!(truncate_response(Some("abc"), Some(3)).as_deref(), Some("abc"));
        assert_eq!(truncate_response(Some("abcdef"), None).as_deref(), Some("abcdef"));
        assert_eq!(truncate_response(None, Some(3)), None);
        assert_eq!(truncate_response(Some("héllo"), Some(2)).as_deref(), Some("hé..."));
    }

    #[test]
    fn test_tracking_listens_to_both_proxies_until_stopped() {
        let xhr = Rc::new(RequestProxyHub::new());
        let fetch = Rc::new(RequestProxyHub::new());
        let observable = ErrorObservable::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            observable.subscribe(move |error: &RawError| seen.borrow_mut().push(error.message.clone()));
        }

        let tracking = track_network_error(Rc::new(configuration()), observable, xhr.clone(), fetch.clone());
        xhr.complete(&request(502));
        fetch.complete(&request(504));
        tracking.stop();
        xhr.complete(&request(500));

        assert_eq!(
            *seen.borrow(),
            vec![
                "XHR error GET https://api.example.com/items".to_string(),
                "Fetch error GET https://api.example.com/items".to_string(),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_truncation_keeps_prefix_and_bounds_length(body in ".{0,64}", limit in 0usize..48) {
            let truncated = truncate_response(Some(&body), Some(limit)).unwrap_or_default();
            let body_len = body.chars().count();
            if body_len > limit {
                prop_assert_eq!(truncated.chars().count(), limit + 3);
                prop_assert!(truncated.ends_with("..."));
                let prefix: String = body.chars().take(limit).collect();
                prop_assert!(truncated.starts_with(&prefix));
            } else {
                prop_assert_eq!(truncated, body);
            }
        }
    }
}
