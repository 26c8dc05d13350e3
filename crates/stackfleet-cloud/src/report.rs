//! Execution report
//!
//! Lists every stack's outcome, including stacks that never ran. Outputs
//! are literal handle values; secret material has no way in.

use crate::action::ActionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-stack lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackState {
    Pending,
    Materializing,
    Materialized,
    Failed,
    Skipped,
}

impl fmt::Display for StackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackState::Pending => write!(f, "pending"),
            StackState::Materializing => write!(f, "materializing"),
            StackState::Materialized => write!(f, "materialized"),
            StackState::Failed => write!(f, "failed"),
            StackState::Skipped => write!(f, "skipped"),
        }
    }
}

/// Originating resource and error of a failed stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackError {
    /// Absent when the failure happened outside any resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub id: String,
    pub action: ActionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackReport {
    pub id: String,
    pub state: StackState,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StackError>,
    #[serde(default)]
    pub resources: Vec<ResourceReport>,
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

impl StackReport {
    pub fn new(id: impl Into<String>, state: StackState) -> Self {
        Self {
            id: id.into(),
            state,
            duration_ms: 0,
            error: None,
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }
}

/// Result of one provisioning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Provisioning order that was followed
    pub order: Vec<String>,
    /// In provisioning order
    pub stacks: Vec<StackReport>,
    pub duration_ms: u64,
}

impl ExecutionReport {
    pub fn stack(&self, id: &str) -> Option<&StackReport> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn state_of(&self, id: &str) -> Option<StackState> {
        self.stack(id).map(|s| s.state)
    }

    pub fn count(&self, state: StackState) -> usize {
        self.stacks.iter().filter(|s| s.state == state).count()
    }

    /// True iff every stack was materialized
    pub fn is_success(&self) -> bool {
        self.stacks
            .iter()
            .all(|s| s.state == StackState::Materialized)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stack in &self.stacks {
            write!(
                f,
                "{:<14} {} ({}ms)",
                stack.state.to_string(),
                stack.id,
                stack.duration_ms
            )?;
            if let Some(error) = &stack.error {
                match &error.resource {
                    Some(resource) => write!(f, " - {}: {}", resource, error.message)?,
                    None => write!(f, " - {}", error.message)?,
                }
            }
            writeln!(f)?;
            for resource in &stack.resources {
                writeln!(f, "    {:<8} {}", resource.action.to_string(), resource.id)?;
            }
            for (name, value) in &stack.outputs {
                writeln!(f, "    output {} = {}", name, value)?;
            }
        }
        write!(
            f,
            "{} materialized, {} failed, {} skipped in {}ms",
            self.count(StackState::Materialized),
            self.count(StackState::Failed),
            self.count(StackState::Skipped),
            self.duration_ms
        )
    }
}
