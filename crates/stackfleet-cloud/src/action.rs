//! What the provider did for a resource

use serde::{Deserialize, Serialize};

/// Outcome of an idempotent ensure call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// The resource did not exist and was created
    Create,
    /// The resource existed with different inputs
    Update,
    /// Nothing to do
    NoOp,
}

impl ActionType {
    pub fn is_change(&self) -> bool {
        *self != ActionType::NoOp
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}
