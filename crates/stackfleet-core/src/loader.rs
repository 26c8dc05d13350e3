//! Unified loader
//!
//! Ties discovery, parsing and graph building together.

use crate::discovery::{discover_files, find_project_root};
use crate::error::{LoadError, Result};
use crate::graph::{ProvisioningGraph, build};
use crate::model::{Stack, StackDocument};
use crate::parser::parse_kdl_string;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Load stacks from a single file, choosing the format by extension
#[instrument(skip(path), fields(path = %path.display()))]
pub fn load_stack_file(path: &Path) -> Result<Vec<Stack>> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadError::IoError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let stacks = match path.extension().and_then(|e| e.to_str()) {
        Some("kdl") => parse_kdl_string(&content)?,
        Some("yaml") | Some("yml") => serde_yaml::from_str::<StackDocument>(&content)?.stacks,
        Some("json") => serde_json::from_str::<StackDocument>(&content)?.stacks,
        _ => return Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(stacks = stacks.len(), "Loaded stack file");
    Ok(stacks)
}

/// Discover and load the project containing the current directory
#[instrument]
pub fn load_project() -> Result<Vec<Stack>> {
    let project_root = find_project_root()?;
    load_project_from_root(&project_root)
}

/// Load every stack under a project root.
///
/// Load order: root file, then `stacks/**/*.kdl` by path, then the local
/// override. A stack in the local override replaces the stack with the same id.
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_project_from_root(project_root: &Path) -> Result<Vec<Stack>> {
    let discovered = discover_files(project_root)?;
    if discovered.root.is_none() {
        return Err(LoadError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    let mut stacks = Vec::new();
    if let Some(root) = &discovered.root {
        stacks.extend(load_stack_file(root)?);
    }
    for file in &discovered.stacks {
        stacks.extend(load_stack_file(file)?);
    }

    if let Some(local) = &discovered.local_override {
        for stack in load_stack_file(local)? {
            match stacks.iter_mut().find(|s| s.id == stack.id) {
                Some(existing) => {
                    debug!(stack = %stack.id, "Local override replaces stack");
                    *existing = stack;
                }
                None => stacks.push(stack),
            }
        }
    }

    info!(stacks = stacks.len(), "Project loaded");
    Ok(stacks)
}

/// Load a project root and build its provisioning graph
pub fn load_graph_from_root(project_root: &Path) -> Result<ProvisioningGraph> {
    Ok(build(load_project_from_root(project_root)?)?)
}

/// Load a single file and build its provisioning graph
pub fn load_graph_from_file(path: &Path) -> Result<ProvisioningGraph> {
    Ok(build(load_stack_file(path)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::model::Value;
    use std::fs;

    fn create_test_project(base: &Path) -> Result<()> {
        fs::write(
            base.join("stackfleet.kdl"),
            r#"
stack "net-base" {
    resource "vpc" kind="network" {
        input "cidr" "10.13.0.0/16"
        outputs "vpcId"
    }
    output "vpcId" resource="vpc"
}
"#,
        )?;

        fs::create_dir_all(base.join("stacks"))?;
        fs::write(
            base.join("stacks/stateful.kdl"),
            r#"
stack "stateful" {
    resource "rds" kind="datastore" {
        input "engine" "sqlserver-ex"
        input "network" ref="net-base.vpcId"
        outputs "hostname"
    }
    output "dbHost" resource="rds" attribute="hostname"
}
"#,
        )?;

        Ok(())
    }

    #[test]
    fn test_load_project_from_root() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        create_test_project(temp_dir.path())?;

        let stacks = load_project_from_root(temp_dir.path())?;
        let ids: Vec<&str> = stacks.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["net-base", "stateful"]);

        let graph = load_graph_from_root(temp_dir.path())?;
        assert_eq!(graph.edges(), vec![("net-base", "stateful")]);
        Ok(())
    }

    #[test]
    fn test_local_override_replaces_stack() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        create_test_project(temp_dir.path())?;
        fs::write(
            temp_dir.path().join("stackfleet.local.kdl"),
            r#"
stack "net-base" {
    resource "vpc" kind="network" {
        input "cidr" "10.99.0.0/16"
        outputs "vpcId"
    }
    output "vpcId" resource="vpc"
}
"#,
        )?;

        let stacks = load_project_from_root(temp_dir.path())?;
        assert_eq!(stacks.len(), 2);
        assert_eq!(stacks[0].id, "net-base");
        assert_eq!(
            stacks[0].resources[0].inputs["cidr"],
            Value::literal("10.99.0.0/16")
        );
        Ok(())
    }

    #[test]
    fn test_load_yaml_file() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fleet.yaml");
        fs::write(
            &path,
            r#"
stacks:
  - id: a
    resources:
      - id: vpc
        kind: network
        inputs: { cidr: 10.0.0.0/16 }
        outputs: [vpcId]
    outputs:
      vpcId: { resource: vpc }
  - id: b
    resources:
      - id: cluster
        kind: cluster
        inputs:
          network: { stack: a, output: vpcId }
"#,
        )?;

        let graph = load_graph_from_file(&path)?;
        assert_eq!(graph.order_ids(), vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn test_load_graph_reports_graph_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fleet.json");
        fs::write(
            &path,
            r#"{"stacks":[{"id":"b","resources":[{"id":"c","kind":"cluster","inputs":{"network":{"stack":"a","output":"vpcId"}}}]}]}"#,
        )
        .unwrap();

        let err = load_graph_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Graph(GraphError::UnknownStack { .. })
        ));
    }

    #[test]
    fn test_unsupported_format() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("fleet.toml");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            load_stack_file(&path).unwrap_err(),
            LoadError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_stack_file(Path::new("/nonexistent/stackfleet.kdl")).unwrap_err();
        assert!(matches!(err, LoadError::IoError { .. }));
    }
}
