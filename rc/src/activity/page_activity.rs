//! Idle page activity detection
//!
//! A window opens when [`wait_idle_page_activity`] is called and closes when
//! the page has been quiet for `end_delay` after its last activity (the
//! activity counts), or when `max_duration` has elapsed since the window
//! opened, whichever comes first. Pending requests keep the page busy: the
//! quiet timer is not armed until every request started inside the window has
//! completed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::debug;

use crate::collection::RumEventType;
use crate::lifecycle::{EntryType, LifeCycle, LifeCycleEvent, LifeCycleEventKind, Subscription};
use crate::time::{Clock, RelativeTime, Scheduler, Timer};

pub const DEFAULT_END_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(10);

/// Timing of an activity window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageActivityConfig {
    /// Quiet period after the last activity that ends the window
    pub end_delay: Duration,
    /// Hard cap on the window, measured from its start
    pub max_duration: Duration,
}

impl Default for PageActivityConfig {
    fn default() -> Self {
        Self {
            end_delay: DEFAULT_END_DELAY,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

/// How a window ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageActivityEnd {
    pub had_activity: bool,
    /// Time of the last activity when the page went quiet, or the cap time
    pub end_time: RelativeTime,
}

enum Activity {
    Signal,
    RequestStarted(u64),
    RequestCompleted(u64),
}

#[derive(Default)]
struct WindowState {
    had_activity: bool,
    last_activity: RelativeTime,
    first_request_index: Option<u64>,
    pending_requests: u64,
}

struct Window {
    clock: Rc<dyn Clock>,
    state: RefCell<WindowState>,
    done: Cell<bool>,
    callback: RefCell<Option<Box<dyn FnOnce(PageActivityEnd)>>>,
    quiet: Timer,
    cap: Timer,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl Window {
    fn record(&self, activity: Activity) {
        let busy = {
            let mut state = self.state.borrow_mut();
            if self.done.get() {
                return;
            }
            match activity {
                Activity::Signal => {}
                Activity::RequestStarted(index) => {
                    if state.first_request_index.is_none() {
                        state.first_request_index = Some(index);
                    }
                    state.pending_requests += 1;
                }
                Activity::RequestCompleted(index) => match state.first_request_index {
                    Some(first) if index >= first => {
                        state.pending_requests = state.pending_requests.saturating_sub(1);
                    }
                    // started before the window opened
                    _ => return,
                },
            }
            state.had_activity = true;
            state.last_activity = self.clock.now().relative;
            state.pending_requests > 0
        };

        if busy {
            self.quiet.cancel();
        } else {
            self.quiet.reset();
        }
    }

    fn on_quiet(&self) {
        let end_time = self.state.borrow().last_activity;
        debug!(end_ms = end_time.as_millis_f64(), "IdlePageActivity: page went quiet");
        self.settle(PageActivityEnd {
            had_activity: true,
            end_time,
        });
    }

    fn on_cap(&self) {
        let had_activity = self.state.borrow().had_activity;
        let end_time = self.clock.now().relative;
        debug!(had_activity, end_ms = end_time.as_millis_f64(), "IdlePageActivity: max duration reached");
        self.settle(PageActivityEnd { had_activity, end_time });
    }

    fn settle(&self, end: PageActivityEnd) {
        if self.done.replace(true) {
            return;
        }
        self.teardown();
        let callback = self.callback.borrow_mut().take();
        if let Some(callback) = callback {
            callback(end);
        }
    }

    fn stop(&self) {
        if self.done.replace(true) {
            return;
        }
        debug!("IdlePageActivity::stop: window closed before settling");
        self.teardown();
        let callback = self.callback.borrow_mut().take();
        drop(callback);
    }

    fn teardown(&self) {
        self.quiet.cancel();
        self.cap.cancel();
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// Handle on an open activity window
///
/// Dropping the handle stops the window.
pub struct IdlePageActivity {
    window: Rc<Window>,
}

impl IdlePageActivity {
    /// Close the window without invoking the callback; idempotent and safe after settlement
    pub fn stop(&self) {
        self.window.stop();
    }

    pub fn is_settled(&self) -> bool {
        self.window.done.get()
    }
}

impl Drop for IdlePageActivity {
    fn drop(&mut self) {
        self.window.stop();
    }
}

/// Open an activity window now and call `callback` once when it settles
pub fn wait_idle_page_activity(
    lifecycle: &LifeCycle,
    clock: Rc<dyn Clock>,
    scheduler: Rc<dyn Scheduler>,
    config: PageActivityConfig,
    callback: impl FnOnce(PageActivityEnd) + 'static,
) -> IdlePageActivity {
    debug!(?config, "wait_idle_page_activity: called");
    let window = Rc::new_cyclic(|weak: &Weak<Window>| {
        let on_quiet = weak.clone();
        let on_cap = weak.clone();
        Window {
            clock,
            state: RefCell::new(WindowState::default()),
            done: Cell::new(false),
            callback: RefCell::new(Some(Box::new(callback))),
            quiet: Timer::new(Rc::clone(&scheduler), config.end_delay, move || {
                if let Some(window) = on_quiet.upgrade() {
                    window.on_quiet();
                }
            }),
            cap: Timer::new(Rc::clone(&scheduler), config.max_duration, move || {
                if let Some(window) = on_cap.upgrade() {
                    window.on_cap();
                }
            }),
            subscriptions: RefCell::new(Vec::new()),
        }
    });

    let subscriptions = subscribe_activity(lifecycle, Rc::downgrade(&window));
    *window.subscriptions.borrow_mut() = subscriptions;
    window.cap.reset();

    IdlePageActivity { window }
}

fn subscribe_activity(lifecycle: &LifeCycle, window: Weak<Window>) -> Vec<Subscription> {
    let kinds = [
        LifeCycleEventKind::DomMutated,
        LifeCycleEventKind::PerformanceEntryCollected,
        LifeCycleEventKind::RequestStarted,
        LifeCycleEventKind::RequestCompleted,
        LifeCycleEventKind::RawEventCollected,
    ];
    kinds
        .into_iter()
        .map(|kind| {
            let window = window.clone();
            lifecycle.subscribe(kind, move |event| {
                let Some(activity) = classify(event) else {
                    return;
                };
                if let Some(window) = window.upgrade() {
                    window.record(activity);
                }
            })
        })
        .collect()
}

fn classify(event: &LifeCycleEvent) -> Option<Activity> {
    match event {
        LifeCycleEvent::DomMutated => Some(Activity::Signal),
        LifeCycleEvent::PerformanceEntryCollected(entry) => {
            matches!(entry.entry_type, EntryType::Resource | EntryType::LongTask).then_some(Activity::Signal)
        }
        LifeCycleEvent::RequestStarted(start) => Some(Activity::RequestStarted(start.request_index)),
        LifeCycleEvent::RequestCompleted(complete) => Some(Activity::RequestCompleted(complete.request_index)),
        LifeCycleEvent::RawEventCollected(collected) => {
            (collected.raw_rum_event.event_type() == RumEventType::Error).then_some(Activity::Signal)
        }
        _ => None,
    }
}
