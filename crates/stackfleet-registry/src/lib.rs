//! Node registry and placement engine
//!
//! - **Nodes**: externally registered execution hosts, read-only here
//! - **Placement**: elastic validation for cloud-managed services,
//!   attribute-constrained selection for external services
//! - **Health gate**: post-deployment health polling with rollback to the
//!   last stable placement

pub mod error;
pub mod health;
pub mod model;
pub mod parser;
pub mod placement;
pub mod registry;

pub use error::*;
pub use health::*;
pub use model::*;
pub use parser::*;
pub use placement::*;
pub use registry::*;
