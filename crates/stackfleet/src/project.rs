//! Resolving what the CLI operates on

use anyhow::Context;
use stackfleet_core::{GraphError, LoadError, ProvisioningGraph, Stack, discover_files};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loaded stack definitions plus where they came from
pub struct Project {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub stacks: Vec<Stack>,
    pub nodes_file: Option<PathBuf>,
}

impl Project {
    pub fn graph(&self) -> Result<ProvisioningGraph, GraphError> {
        stackfleet_core::build(self.stacks.clone())
    }
}

/// Load an explicit file, or discover the project around the current directory.
///
/// Without a project root the global stack file (see
/// [`stackfleet_config::find_stack_file`]) is used.
pub fn load(file: Option<&Path>) -> anyhow::Result<Project> {
    if let Some(file) = file {
        return load_file(file);
    }

    match stackfleet_core::find_project_root() {
        Ok(root) => {
            let discovered = discover_files(&root)?;
            let stacks = stackfleet_core::load_project_from_root(&root)?;
            Ok(Project {
                files: discovered.stack_files().cloned().collect(),
                nodes_file: discovered.nodes,
                root,
                stacks,
            })
        }
        Err(LoadError::ProjectRootNotFound(start)) => {
            let file = stackfleet_config::find_stack_file().map_err(|_| {
                anyhow::anyhow!(LoadError::ProjectRootNotFound(start))
            })?;
            debug!(file = %file.display(), "Using global stack file");
            load_file(&file)
        }
        Err(e) => Err(e.into()),
    }
}

fn load_file(file: &Path) -> anyhow::Result<Project> {
    let stacks = stackfleet_core::load_stack_file(file)
        .with_context(|| format!("failed to load {}", file.display()))?;

    let root = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    let nodes_file = discover_files(&root)?.nodes;

    Ok(Project {
        files: vec![file.to_path_buf()],
        root,
        stacks,
        nodes_file,
    })
}
