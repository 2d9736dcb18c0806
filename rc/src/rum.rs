//! RumContext - owns one instance of every component and wires them together
//!
//! Start order matters only in that builders subscribe before producers can
//! publish: view, action, resource and long task collection, then the error
//! aggregator and its collection, then click tracking.

use std::rc::Rc;

use tracing::{debug, info};

use crate::action::{ActionTracker, Context, Element, track_actions};
use crate::activity::PageActivityConfig;
use crate::collaborators::{Configuration, RequestProxy, Session, StackTraceSource};
use crate::collection::{
    start_action_collection, start_error_collection, start_long_task_collection, start_resource_collection,
    start_view_collection,
};
use crate::errors::{AutomaticErrorCollection, Console, ErrorCollaborators, ErrorObservable, RawError};
use crate::lifecycle::{LifeCycle, ObservableSubscription, Subscription};
use crate::monitoring::MonitoringSink;
use crate::time::{Clock, Scheduler};

/// Everything the host provides
#[derive(Clone)]
pub struct Collaborators {
    pub configuration: Rc<dyn Configuration>,
    pub session: Rc<dyn Session>,
    pub console: Rc<Console>,
    pub stack_traces: Rc<dyn StackTraceSource>,
    pub xhr: Rc<dyn RequestProxy>,
    pub fetch: Rc<dyn RequestProxy>,
    pub clock: Rc<dyn Clock>,
    pub scheduler: Rc<dyn Scheduler>,
    pub monitor: Rc<dyn MonitoringSink>,
}

/// A running engine
///
/// Stopping (explicitly or by drop) detaches every subscription, restores
/// the console and resets the request proxies.
pub struct RumContext {
    lifecycle: LifeCycle,
    errors: AutomaticErrorCollection,
    error_stream: ErrorObservable,
    error_collection: ObservableSubscription<RawError>,
    actions: ActionTracker,
    subscriptions: Vec<Subscription>,
}

impl RumContext {
    pub fn start(activity: PageActivityConfig, collaborators: Collaborators) -> Self {
        info!(?activity, "Starting RUM engine");
        let lifecycle = LifeCycle::new(Rc::clone(&collaborators.monitor));

        let mut subscriptions = vec![start_view_collection(&lifecycle)];
        subscriptions.extend(start_action_collection(&lifecycle));
        subscriptions.extend(start_resource_collection(
            &lifecycle,
            Rc::clone(&collaborators.session),
            Rc::clone(&collaborators.configuration),
            Rc::clone(&collaborators.clock),
        ));
        subscriptions.push(start_long_task_collection(&lifecycle, Rc::clone(&collaborators.clock)));

        let errors = AutomaticErrorCollection::new(ErrorCollaborators {
            configuration: Rc::clone(&collaborators.configuration),
            console: Rc::clone(&collaborators.console),
            stack_traces: Rc::clone(&collaborators.stack_traces),
            xhr: Rc::clone(&collaborators.xhr),
            fetch: Rc::clone(&collaborators.fetch),
            clock: Rc::clone(&collaborators.clock),
            monitor: Rc::clone(&collaborators.monitor),
        });
        let error_stream = errors.start();
        let error_collection = start_error_collection(&lifecycle, &error_stream);

        let actions = track_actions(
            &lifecycle,
            Rc::clone(&collaborators.clock),
            Rc::clone(&collaborators.scheduler),
            activity,
        );

        Self {
            lifecycle,
            errors,
            error_stream,
            error_collection,
            actions,
            subscriptions,
        }
    }

    pub fn lifecycle(&self) -> &LifeCycle {
        &self.lifecycle
    }

    /// The raw error stream fed by the console, runtime and network producers
    pub fn error_stream(&self) -> ErrorObservable {
        self.error_stream.clone()
    }

    pub fn actions(&self) -> &ActionTracker {
        &self.actions
    }

    pub fn on_click(&self, target: &Element) -> Option<String> {
        self.actions.on_click(target)
    }

    pub fn add_action(&self, name: impl Into<String>, context: Option<Context>) {
        self.actions.add_action(name, context);
    }

    pub fn stop(&self) {
        debug!("RumContext::stop: called");
        self.actions.stop();
        self.errors.stop();
        self.error_collection.unsubscribe();
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

impl Drop for RumContext {
    fn drop(&mut self) {
        self.stop();
    }
}
