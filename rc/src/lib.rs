//! rumcore - Real-user-monitoring event lifecycle engine
//!
//! rumcore observes raw browser signals (request completions, thrown and
//! logged errors, clicks, long tasks, view updates) and turns them into
//! canonical, timestamped records for a RUM collector. Everything runs on one
//! thread; the host delivers signals as method calls and drives timers through
//! a [`time::Scheduler`].
//!
//! # Core Concepts
//!
//! - **One Bus**: producers and consumers only meet on the [`lifecycle::LifeCycle`]
//! - **Idle Detection**: an action lasts until the page has gone quiet
//! - **One Pending Action**: a new click is ignored while an action is open
//! - **Paired Clocks**: durations come from monotonic time, dates from the wall clock
//!
//! # Modules
//!
//! - [`time`] - clocks, durations and timers
//! - [`monitoring`] - internal fault reporting
//! - [`lifecycle`] - event bus and event vocabulary
//! - [`collaborators`] - host interfaces and in-memory implementations
//! - [`errors`] - raw error aggregation from console, runtime and network
//! - [`activity`] - event counting and idle page activity detection
//! - [`action`] - click tracking and the pending action state machine
//! - [`collection`] - builders of the outbound raw events
//! - [`rum`] - the owning context wiring it all together
//! - [`config`] - configuration types and loading
//! - [`scenario`] - scripted replay
//! - [`cli`] - command-line interface of `rumreplay`

pub mod action;
pub mod activity;
pub mod cli;
pub mod collaborators;
pub mod collection;
pub mod config;
pub mod error;
pub mod errors;
pub mod lifecycle;
pub mod monitoring;
pub mod rum;
pub mod scenario;
pub mod time;

// Re-export commonly used types
pub use action::{Action, ActionType, AutoAction, CustomAction, Element};
pub use collaborators::{Configuration, RequestProxy, RequestProxyHub, Session, StackTraceHub, StackTraceSource};
pub use collection::{RawEventCollected, RawRumEvent};
pub use config::Config;
pub use error::{ConfigError, ScenarioError};
pub use errors::{AutomaticErrorCollection, Console, ConsoleArg, ErrorSource, RawError};
pub use lifecycle::{LifeCycle, LifeCycleEvent, LifeCycleEventKind, Observable, Subscription};
pub use rum::{Collaborators, RumContext};
pub use time::{Clock, ClocksState, RelativeTime, Scheduler, TimeStamp, VirtualScheduler};
