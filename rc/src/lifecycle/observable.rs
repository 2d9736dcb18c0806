//! Single-payload observable
//!
//! Same delivery rules as the lifecycle bus (subscription order, snapshot
//! before dispatch, idempotent unsubscribe, per-observer panic isolation) for
//! streams that carry one payload type, such as the raw error stream.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::monitoring::{MonitoringSink, TracingMonitor, monitor};

type Observer<T> = Rc<dyn Fn(&T)>;

struct Observers<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

/// Multicast stream of `T`; clones share the same observers
pub struct Observable<T> {
    observers: Rc<RefCell<Observers<T>>>,
    monitor: Rc<dyn MonitoringSink>,
}

impl<T: 'static> Observable<T> {
    pub fn new() -> Self {
        Self::with_monitor(Rc::new(TracingMonitor))
    }

    /// Observable whose panicking observers are reported to `monitor`
    pub fn with_monitor(monitor: Rc<dyn MonitoringSink>) -> Self {
        Self {
            observers: Rc::new(RefCell::new(Observers {
                next_id: 0,
                entries: Vec::new(),
            })),
            monitor,
        }
    }

    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> ObservableSubscription<T> {
        let mut observers = self.observers.borrow_mut();
        observers.next_id += 1;
        let id = observers.next_id;
        observers.entries.push((id, Rc::new(observer)));
        debug!(id, "Observable::subscribe: new observer");
        ObservableSubscription {
            observers: Rc::downgrade(&self.observers),
            id,
        }
    }

    /// Deliver `value` to the current observers, in subscription order
    ///
    /// A panicking observer is reported to the monitor; the others still run.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .observers
            .borrow()
            .entries
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in snapshot {
            let _ = monitor(self.monitor.as_ref(), "observable observer", || observer(value));
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().entries.len()
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            observers: Rc::clone(&self.observers),
            monitor: Rc::clone(&self.monitor),
        }
    }
}

/// Handle returned by [`Observable::subscribe`]
pub struct ObservableSubscription<T> {
    observers: Weak<RefCell<Observers<T>>>,
    id: u64,
}

impl<T> ObservableSubscription<T> {
    pub fn unsubscribe(&self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.borrow_mut().entries.retain(|(id, _)| *id != self.id);
            debug!(id = self.id, "ObservableSubscription::unsubscribe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::MemoryMonitor;

    #[test]
    fn test_observers_receive_values_in_order() {
        let observable: Observable<u32> = Observable::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for label in ["a", "b"] {
            let log = Rc::clone(&log);
            observable.subscribe(move |value: &u32| log.borrow_mut().push(format!("{}{}", label, value)));
        }

        observable.notify(&1);
        observable.notify(&2);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let observable: Observable<&'static str> = Observable::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let subscription = {
            let log = Rc::clone(&log);
            observable.subscribe(move |value: &&'static str| log.borrow_mut().push(*value))
        };

        observable.notify(&"kept");
        subscription.unsubscribe();
        subscription.unsubscribe();
        observable.notify(&"dropped");

        assert_eq!(*log.borrow(), vec!["kept"]);
        assert_eq!(observable.observer_count(), 0);
    }

    #[test]
    fn test_panicking_observer_is_isolated_and_reported() {
        let sink = Rc::new(MemoryMonitor::new());
        let observable: Observable<u32> = Observable::with_monitor(sink.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        observable.subscribe(|_| panic!("observer fault"));
        {
            let seen = Rc::clone(&seen);
            observable.subscribe(move |value: &u32| seen.borrow_mut().push(*value));
        }

        observable.notify(&7);

        assert_eq!(*seen.borrow(), vec![7]);
        assert_eq!(sink.reports(), vec!["observable observer: observer fault".to_string()]);
    }

    #[test]
    fn test_clones_share_observers() {
        let observable: Observable<u8> = Observable::new();
        let hits = Rc::new(RefCell::new(0));
        {
            let hits = Rc::clone(&hits);
            observable.clone().subscribe(move |_| *hits.borrow_mut() += 1);
        }
        observable.notify(&0);
        assert_eq!(*hits.borrow(), 1);
    }
}
