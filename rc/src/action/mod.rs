//! Action coordination
//!
//! - [`manager`] - the single pending-action slot and its state machine
//! - [`tracker`] - click and view wiring on top of the manager
//! - [`name`] - action name derivation from the click target
//! - [`types`] - auto, custom and combined action records

pub mod manager;
pub mod name;
pub mod tracker;
mod types;

pub use manager::ActionManager;
pub use name::{ACTION_NAME_ATTRIBUTE, Element, get_action_name_from_element};
pub use tracker::{ActionTracker, track_actions};
pub use types::{Action, ActionCounts, ActionType, AutoAction, AutoActionCreated, Context, CustomAction};
