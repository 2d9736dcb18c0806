//! Lifecycle event bus
//!
//! The bus is the spine of the engine: producers publish typed
//! [`LifeCycleEvent`]s, consumers subscribe by [`LifeCycleEventKind`].
//! [`Observable`] is the single-payload counterpart used for the raw error
//! stream.

mod bus;
mod observable;
mod types;

pub use bus::{LifeCycle, Subscription};
pub use observable::{Observable, ObservableSubscription};
pub use types::{
    EntryType, LifeCycleEvent, LifeCycleEventKind, PerformanceEntry, RequestCompleteEvent, RequestStartEvent,
    RequestType, TraceIdentifier, ViewCreatedEvent, ViewEvent, ViewEventCounts, ViewLoadingType, ViewTimings,
};
