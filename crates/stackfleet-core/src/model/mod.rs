//! Data model
//!
//! Descriptors and stacks are built once and never mutated afterwards.
//! Handles only exist during a provisioning run.

mod handle;
mod resource;
mod stack;
mod value;
mod workload;

// Re-exports
pub use handle::*;
pub use resource::*;
pub use stack::*;
pub use value::*;
pub use workload::*;

/// Top-level shape of YAML/JSON stack files
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StackDocument {
    #[serde(default)]
    pub stacks: Vec<Stack>,
}
