//! Action data types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::activity::EventCounts;
use crate::time::ClocksState;

/// Free-form key/value context attached by the host application
pub type Context = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Click,
    Custom,
}

/// Published as soon as a pending auto action opens
#[derive(Debug, Clone, PartialEq)]
pub struct AutoActionCreated {
    pub id: String,
    pub start_clocks: ClocksState,
}

/// Events collected while an auto action was pending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub error_count: u64,
    pub long_task_count: u64,
    pub resource_count: u64,
}

impl From<EventCounts> for ActionCounts {
    fn from(counts: EventCounts) -> Self {
        Self {
            error_count: counts.error_count,
            long_task_count: counts.long_task_count,
            resource_count: counts.resource_count,
        }
    }
}

/// A completed auto action
#[derive(Debug, Clone, PartialEq)]
pub struct AutoAction {
    pub id: String,
    pub action_type: ActionType,
    pub name: String,
    pub start_clocks: ClocksState,
    pub duration: Duration,
    pub counts: ActionCounts,
}

/// An action declared by the host application
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAction {
    pub name: String,
    pub start_clocks: ClocksState,
    pub context: Option<Context>,
}

/// Either kind of action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Auto(AutoAction),
    Custom(CustomAction),
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::Auto(action) => action.action_type,
            Action::Custom(_) => ActionType::Custom,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Action::Auto(action) => &action.name,
            Action::Custom(action) => &action.name,
        }
    }

    pub fn start_clocks(&self) -> ClocksState {
        match self {
            Action::Auto(action) => action.start_clocks,
            Action::Custom(action) => action.start_clocks,
        }
    }
}
