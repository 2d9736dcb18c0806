//! Page activity tracking
//!
//! - [`event_counts`] - per-window tallies of collected events
//! - [`page_activity`] - the idle detector deciding when a burst of activity is over

pub mod event_counts;
pub mod page_activity;

pub use event_counts::{EventCounts, EventCountsSubscription, track_event_counts};
pub use page_activity::{IdlePageActivity, PageActivityConfig, PageActivityEnd, wait_idle_page_activity};
