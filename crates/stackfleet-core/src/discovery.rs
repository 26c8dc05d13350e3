//! Project file discovery
//!
//! Finds stack definition files from a convention-based directory layout.

use crate::error::{LoadError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Root file names, in priority order
pub const ROOT_FILES: &[&str] = &[
    "stackfleet.kdl",
    "stackfleet.yaml",
    "stackfleet.yml",
    "stackfleet.json",
];

/// Project-local directory
pub const PROJECT_DIR: &str = ".stackfleet";

/// Files discovered under a project root
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    /// Root file (stackfleet.kdl or one of its YAML/JSON equivalents)
    pub root: Option<PathBuf>,
    /// Additional stack files (stacks/**/*.kdl), sorted by path
    pub stacks: Vec<PathBuf>,
    /// Registered nodes (nodes.kdl)
    pub nodes: Option<PathBuf>,
    /// Local override (stackfleet.local.kdl)
    pub local_override: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// Every stack-bearing file in load order
    pub fn stack_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.root
            .iter()
            .chain(self.stacks.iter())
            .chain(self.local_override.iter())
    }
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn has_root_file(dir: &Path) -> bool {
    first_existing(dir, ROOT_FILES).is_some()
        || first_existing(&dir.join(PROJECT_DIR), ROOT_FILES).is_some()
}

/// Locate the project root.
///
/// Checks `STACKFLEET_PROJECT_ROOT` first, then walks up from the current
/// directory looking for a root file or `.stackfleet/<root file>`.
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("STACKFLEET_PROJECT_ROOT") {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking STACKFLEET_PROJECT_ROOT");
        if has_root_file(&path) {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// Walk up from `start_dir` looking for a project root
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if has_root_file(&current) {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(LoadError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// Discover project files under `project_root`
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    let mut discovered = DiscoveredFiles::default();
    let project_dir = project_root.join(PROJECT_DIR);

    discovered.root =
        first_existing(project_root, ROOT_FILES).or_else(|| first_existing(&project_dir, ROOT_FILES));
    if let Some(root) = &discovered.root {
        debug!(file = %root.display(), "Found root file");
    }

    let stacks_dir = project_root.join("stacks");
    if stacks_dir.is_dir() {
        discovered.stacks = discover_kdl_files(&stacks_dir)?;
        info!(
            stack_files = discovered.stacks.len(),
            "Discovered stack files"
        );
    }

    discovered.nodes = first_existing(project_root, &["nodes.kdl"])
        .or_else(|| first_existing(&project_dir, &["nodes.kdl"]));

    discovered.local_override = first_existing(project_root, &["stackfleet.local.kdl"])
        .or_else(|| first_existing(&project_dir, &["stackfleet.local.kdl"]));

    Ok(discovered)
}

/// Recursively collect .kdl files under `dir`, sorted by path
fn discover_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();

    visit_dir(dir, &mut files, &mut visited)?;
    files.sort();

    Ok(files)
}

fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>, visited: &mut HashSet<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let canonical_dir = dir.canonicalize().map_err(|e| LoadError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("failed to canonicalize path: {}", e),
    })?;

    // symlink loop
    if !visited.insert(canonical_dir.clone()) {
        warn!(dir = %canonical_dir.display(), "Symlink loop detected, skipping");
        return Ok(());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| LoadError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("failed to read directory: {}", e),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| LoadError::DiscoveryError {
            path: dir.to_path_buf(),
            message: format!("failed to read directory entry: {}", e),
        })?;
        let path = entry.path();

        if path.is_dir() {
            visit_dir(&path, files, visited)?;
        } else if path.extension().and_then(|s| s.to_str()) == Some("kdl") {
            files.push(path);
        }
    }

    Ok(())
}
