//! stackfleet core
//!
//! Stack model, dependency graph builder, output handle propagation and
//! declarative loaders.

pub mod discovery;
pub mod error;
pub mod graph;
pub mod loader;
pub mod model;
pub mod parser;
pub mod propagate;

pub use discovery::{DiscoveredFiles, discover_files, find_project_root, find_project_root_from};
pub use error::{GraphError, LoadError, PropagationError, Result};
pub use graph::{ProvisioningGraph, SecretDeclaration, build};
pub use loader::{
    load_graph_from_file, load_graph_from_root, load_project, load_project_from_root,
    load_stack_file,
};
pub use model::*;
pub use parser::{parse_kdl_file, parse_kdl_string};
pub use propagate::{publish, resolve, resolve_all};
