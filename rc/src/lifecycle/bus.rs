//! LifeCycle - the synchronous pub/sub hub between producers and consumers
//!
//! Delivery is a same-tick fan-out: `notify` calls every handler subscribed to
//! the event's kind, in subscription order, before returning. The handler list
//! is snapshotted first, so handlers may publish other events or (un)subscribe
//! without disturbing the pass in progress. Each call is isolated: a panicking
//! handler is reported to the monitoring sink and the rest still run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::types::{LifeCycleEvent, LifeCycleEventKind};
use crate::monitoring::{MonitoringSink, TracingMonitor, monitor};

type Handler = Rc<dyn Fn(&LifeCycleEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<LifeCycleEventKind, Vec<(u64, Handler)>>,
}

/// Central event bus; clones share the same subscriber registry
#[derive(Clone)]
pub struct LifeCycle {
    registry: Rc<RefCell<Registry>>,
    monitor: Rc<dyn MonitoringSink>,
}

impl LifeCycle {
    /// Create a bus reporting handler faults to `monitor`
    pub fn new(monitor: Rc<dyn MonitoringSink>) -> Self {
        debug!("LifeCycle::new: creating lifecycle bus");
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
            monitor,
        }
    }

    /// Register `handler` for every future event of `kind`
    pub fn subscribe(&self, kind: LifeCycleEventKind, handler: impl Fn(&LifeCycleEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.entry(kind).or_default().push((id, Rc::new(handler)));
        debug!(%kind, id, "LifeCycle::subscribe: new subscriber");
        Subscription {
            registry: Rc::downgrade(&self.registry),
            kind,
            id,
        }
    }

    /// Deliver `event` to the current subscribers of its kind
    pub fn notify(&self, event: LifeCycleEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .registry
            .borrow()
            .handlers
            .get(&kind)
            .map(|entries| entries.iter().map(|(_, handler)| Rc::clone(handler)).collect())
            .unwrap_or_default();
        debug!(%kind, subscribers = handlers.len(), "LifeCycle::notify");

        for handler in handlers {
            let _ = monitor(
                self.monitor.as_ref(),
                format_args!("lifecycle handler for {}", kind),
                || handler(&event),
            );
        }
    }

    /// Number of handlers currently subscribed to `kind`
    pub fn subscriber_count(&self, kind: LifeCycleEventKind) -> usize {
        self.registry.borrow().handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Sink receiving internal faults
    pub fn monitor(&self) -> Rc<dyn MonitoringSink> {
        Rc::clone(&self.monitor)
    }
}

impl Default for LifeCycle {
    fn default() -> Self {
        Self::new(Rc::new(TracingMonitor))
    }
}

/// Handle returned by [`LifeCycle::subscribe`]
///
/// Unsubscribing is explicit and idempotent; dropping the handle keeps the
/// handler registered.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    kind: LifeCycleEventKind,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.borrow_mut();
        if let Some(entries) = registry.handlers.get_mut(&self.kind) {
            entries.retain(|(id, _)| *id != self.id);
        }
        debug!(kind = %self.kind, id = self.id, "Subscription::unsubscribe");
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("next_id", &self.next_id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::RequestStartEvent;
    use crate::monitoring::MemoryMonitor;

    fn recording_bus() -> (LifeCycle, Rc<MemoryMonitor>) {
        let monitor = Rc::new(MemoryMonitor::new());
        (LifeCycle::new(monitor.clone()), monitor)
    }

    #[test]
    fn test_subscribers_run_in_subscription_order() {
        let (bus, _) = recording_bus();
        let log = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push(label));
        }

        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let (bus, _) = recording_bus();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        bus.subscribe(LifeCycleEventKind::RequestStarted, move |_| *counter.borrow_mut() += 1);

        bus.notify(LifeCycleEvent::DomMutated);
        bus.notify(LifeCycleEvent::RequestStarted(RequestStartEvent { request_index: 1 }));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let (bus, _) = recording_bus();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = bus.subscribe(LifeCycleEventKind::DomMutated, move |_| *counter.borrow_mut() += 1);

        bus.notify(LifeCycleEvent::DomMutated);
        subscription.unsubscribe();
        subscription.unsubscribe();
        bus.notify(LifeCycleEvent::DomMutated);

        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.subscriber_count(LifeCycleEventKind::DomMutated), 0);
    }

    #[test]
    fn test_handler_may_notify_another_kind() {
        let (bus, _) = recording_bus();
        let log = Rc::new(RefCell::new(Vec::new()));

        {
            let inner = bus.clone();
            let log = Rc::clone(&log);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| {
                log.borrow_mut().push("mutation");
                inner.notify(LifeCycleEvent::AutoActionDiscarded);
            });
        }
        {
            let log = Rc::clone(&log);
            bus.subscribe(LifeCycleEventKind::AutoActionDiscarded, move |_| log.borrow_mut().push("discarded"));
        }
        {
            let log = Rc::clone(&log);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push("mutation-2"));
        }

        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["mutation", "discarded", "mutation-2"]);
    }

    #[test]
    fn test_changes_during_dispatch_do_not_affect_current_pass() {
        let (bus, _) = recording_bus();
        let log = Rc::new(RefCell::new(Vec::new()));
        let late: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim = {
            let log = Rc::clone(&log);
            Rc::new(bus.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push("victim")))
        };
        {
            let inner = bus.clone();
            let log = Rc::clone(&log);
            let late = Rc::clone(&late);
            let victim = Rc::clone(&victim);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| {
                log.borrow_mut().push("mutator");
                victim.unsubscribe();
                if late.borrow().is_none() {
                    let log = Rc::clone(&log);
                    let subscription =
                        inner.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push("late"));
                    *late.borrow_mut() = Some(subscription);
                }
            });
        }

        // victim subscribed before the mutator, so it already ran; "late" joins next pass
        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["victim", "mutator"]);

        log.borrow_mut().clear();
        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["mutator", "late"]);
    }

    #[test]
    fn test_unsubscribed_later_handler_still_runs_in_current_pass() {
        let (bus, _) = recording_bus();
        let log = Rc::new(RefCell::new(Vec::new()));
        let target: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        {
            let target = Rc::clone(&target);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| {
                if let Some(subscription) = target.borrow().as_ref() {
                    subscription.unsubscribe();
                }
            });
        }
        {
            let log = Rc::clone(&log);
            let subscription = bus.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push("target"));
            *target.borrow_mut() = Some(subscription);
        }

        bus.notify(LifeCycleEvent::DomMutated);
        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["target"]);
    }

    #[test]
    fn test_panicking_handler_is_isolated_and_reported() {
        let (bus, monitor) = recording_bus();
        let log = Rc::new(RefCell::new(Vec::new()));

        bus.subscribe(LifeCycleEventKind::DomMutated, |_| panic!("handler exploded"));
        {
            let log = Rc::clone(&log);
            bus.subscribe(LifeCycleEventKind::DomMutated, move |_| log.borrow_mut().push("survivor"));
        }

        bus.notify(LifeCycleEvent::DomMutated);
        assert_eq!(*log.borrow(), vec!["survivor"]);
        let reports = monitor.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("handler exploded"));
        assert!(reports[0].contains("DomMutated"));
    }

    #[test]
    fn test_subscription_outliving_bus_is_harmless() {
        let subscription = {
            let (bus, _) = recording_bus();
            bus.subscribe(LifeCycleEventKind::DomMutated, |_| {})
        };
        subscription.unsubscribe();
    }
}
